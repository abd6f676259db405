use crate::domain::model::AppConfig;
use crate::ports::{http::Http, page::PageExtractor, repo::Repo};

pub struct AppContext<R, H, P>
where
    R: Repo,
    H: Http,
    P: PageExtractor,
{
    pub cfg: AppConfig,
    pub repo: R,
    pub http: H,
    pub page: P,
}
