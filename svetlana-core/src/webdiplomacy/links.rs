use url::Url;

use crate::Error;

pub const DEFAULT_BASE_URL: &str = "https://webdiplomacy.net/";

/// Builds the user-facing and fetch URLs for a WebDiplomacy instance.
#[derive(Debug, Clone)]
pub struct BoardLinks {
    base_url: Url,
}

impl BoardLinks {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `https://webdiplomacy.net/board.php?gameID=1234`
    pub fn board_url(&self, game_id: u64) -> String {
        format!("{}board.php?gameID={}", self.base_url, game_id)
    }

    /// Resolves the map image link scraped from a board against the base URL.
    pub fn map_url(&self, resource_link: &str) -> Result<String, Error> {
        Ok(self.base_url.join(resource_link)?.to_string())
    }
}

impl Default for BoardLinks {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
        }
    }
}
