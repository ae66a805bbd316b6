pub mod client;
pub mod errors;
pub mod issues;

pub use client::GitHubClient;
pub use errors::GitHubError;
pub use issues::IssueHandler;
