use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use url::Url;

#[derive(Serialize, Clone, Debug)]
pub struct PartialPage {
    pub title: String,
    pub date: Option<String>,
    pub description: String,
    pub permalink: Url,
}

#[derive(Serialize, Clone, Debug)]
pub struct Page {
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub output_path: PathBuf,
    #[serde(skip)]
    pub template_name: String,
    pub title: String,
    pub heading: Option<String>,
    pub description: String,
    pub date: Option<String>,
    pub updated: Option<String>,
    pub content: String,
    pub permalink: Url,
}

pub fn human_date(date: &str) -> anyhow::Result<String> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
    Ok(date.format("%-d %B %Y").to_string())
}
