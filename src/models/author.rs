use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    /// Scopus author id.
    pub auid: String,
    #[serde(default)]
    pub aliases: Vec<AuthorAlias>,
    /// Citing works this author wrote.
    #[serde(default)]
    pub citing_papers: Vec<String>,
    /// Retracted papers this author wrote.
    #[serde(default)]
    pub retracted_papers: Vec<String>,
}

/// One name/address pair. Authors accumulate several as they move institution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorAlias {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
}
