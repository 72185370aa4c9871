//! Fetching the landing page, optionally through the twitter.com → x.com
//! migration hand-off.
//!
//! A direct fetch is one GET. The migration flow additionally follows a
//! `/migrate?tok=…` redirect (meta refresh or bare URL in the body) and then
//! submits the migration form if the page still carries one.

use regex::Regex;
use scraper::Selector;

use crate::http_client::HttpClient;
use crate::types::{Document, TidResult};

/// Form action used when the migration form does not name one.
pub const DEFAULT_MIGRATE_ACTION: &str = "https://x.com/x/migrate";

/// How the landing page is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandingStrategy {
    /// Single GET of the landing URL.
    #[default]
    Direct,
    /// GET, then follow the legacy-domain migration redirect and form.
    Migrate,
}

/// The migration form found on a landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationForm {
    pub action: String,
    pub method: String,
    pub fields: Vec<(String, String)>,
}

fn migrate_url_regex() -> Regex {
    Regex::new(r"https?://(?:www\.)?(?:twitter|x)\.com(?:/x)?/migrate[/?]?tok=[a-zA-Z0-9%\-_]+")
        .expect("valid regex")
}

/// Locate a migration redirect URL, preferring the meta refresh tag.
pub fn find_migration_redirect(document: &Document) -> Option<String> {
    let re = migrate_url_regex();

    if let Ok(sel) = Selector::parse(r#"meta[http-equiv="refresh"]"#) {
        let from_meta = document
            .html()
            .select(&sel)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|content| re.find(content).map(|m| m.as_str().to_string()));
        if from_meta.is_some() {
            return from_meta;
        }
    }

    re.find(document.source()).map(|m| m.as_str().to_string())
}

/// Locate the migration form (`form[name=f]`, or a form posting to the default action).
pub fn find_migration_form(document: &Document) -> Option<MigrationForm> {
    let selectors = [
        r#"form[name="f"]"#.to_string(),
        format!(r#"form[action="{DEFAULT_MIGRATE_ACTION}"]"#),
    ];
    let input_sel = Selector::parse("input").ok()?;

    let form = selectors.iter().find_map(|s| {
        let sel = Selector::parse(s).ok()?;
        document.html().select(&sel).next()
    })?;

    let action = match form.value().attr("action") {
        Some(raw) => document
            .url()
            .join(raw)
            .map(String::from)
            .unwrap_or_else(|_| raw.to_string()),
        None => DEFAULT_MIGRATE_ACTION.to_string(),
    };
    let method = form.value().attr("method").unwrap_or("POST").to_ascii_uppercase();
    let fields = form
        .select(&input_sel)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some(MigrationForm {
        action,
        method,
        fields,
    })
}

/// Fetch and parse the landing page at `url`.
pub async fn fetch_landing_page(
    client: &HttpClient,
    url: &str,
    strategy: LandingStrategy,
) -> TidResult<Document> {
    let resp = client.get(url).await?;
    let mut document = Document::parse(&resp.final_url, resp.body)?;

    if strategy == LandingStrategy::Direct {
        return Ok(document);
    }

    if let Some(redirect) = find_migration_redirect(&document) {
        tracing::info!("Following migration redirect {redirect}");
        let resp = client.get(&redirect).await?;
        document = Document::parse(&resp.final_url, resp.body)?;
    }

    if let Some(form) = find_migration_form(&document) {
        tracing::info!(
            "Submitting migration form to {} ({} fields)",
            form.action,
            form.fields.len()
        );
        let resp = client
            .send_form(&form.method, &form.action, &form.fields)
            .await?;
        document = Document::parse(&resp.final_url, resp.body)?;
    }

    Ok(document)
}
