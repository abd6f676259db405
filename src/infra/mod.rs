pub mod config;
pub mod file_repo;
pub mod html_page;
pub mod logging;
pub mod reqwest_http;
