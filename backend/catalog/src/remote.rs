use anyhow::{Context, Error};
use prost::Message;
use reqwest::get;

use crate::Catalog;

/// Downloads and decodes a catalog published at `url`.
pub async fn get_catalog_remote(url: &str) -> Result<Catalog, Error> {
    let response = get(url)
        .await
        .with_context(|| format!("fetching catalog from {url}"))?
        .error_for_status()?;
    let bytes = response.bytes().await?;

    Ok(Catalog::decode(&*bytes)?)
}
