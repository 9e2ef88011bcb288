pub mod bitbucket_service;

pub use bitbucket_service::BitbucketService;
