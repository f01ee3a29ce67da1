//! Find-courses search: navigation policy, search URL building, credential
//! handling and page-load state for the embedded course catalog.

pub mod helper;
pub mod http;
pub mod query;

pub use helper::{
    AuthChallengeDisposition, ChallengeHandler, ConfigCredentials, ExternalBrowser, LoadedPage,
    NavigationAction, NavigationPolicy, NavigationRequest, NavigationType, PATH_ID_PLACEHOLDER,
    WebSearchDelegate, WebSearchHelper, WebSurface,
};
pub use http::HttpSurface;
pub use query::{SEARCH_QUERY_PARAM, build_query};
