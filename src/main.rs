use bbtask::presentation::cli::CliApp;

fn main() -> anyhow::Result<()> {
    CliApp::new().run()
}
