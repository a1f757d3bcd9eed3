use anyhow::Context;
use url::Url;

use crate::record::{self, Record};
use crate::source::RecordSource;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// Blocking client for the NCBI E-utilities endpoints. NCBI asks that every
/// request identify the calling tool and a contact address, so the email is
/// part of the client rather than ambient configuration.
pub struct EntrezClient {
    agent: ureq::Agent,
    email: String,
}

impl EntrezClient {
    pub fn new(email: impl Into<String>) -> Self {
        let cfg = ureq::Agent::config_builder()
            .timeout_connect(Some(std::time::Duration::from_secs(5)))
            .timeout_global(Some(std::time::Duration::from_secs(30)))
            .build();
        EntrezClient {
            agent: ureq::Agent::new_with_config(cfg),
            email: email.into(),
        }
    }

    fn get(&self, url: &Url) -> anyhow::Result<String> {
        let body = self
            .agent
            .get(url.as_str())
            .header("User-Agent", concat!("pubcite/", env!("CARGO_PKG_VERSION")))
            .call()
            .with_context(|| format!("request failed: {}", url.path()))?
            .into_body()
            .read_to_string()
            .context("failed to read response body")?;
        Ok(body)
    }

    fn esearch_url(&self, query: &str, retmax: usize) -> anyhow::Result<Url> {
        let mut url = Url::parse(ESEARCH_URL)?;
        url.query_pairs_mut()
            .append_pair("db", "pubmed")
            .append_pair("term", query)
            .append_pair("retmax", &retmax.to_string())
            .append_pair("retmode", "json")
            .append_pair("tool", "pubcite")
            .append_pair("email", &self.email);
        Ok(url)
    }

    fn efetch_url(&self, ids: &[String]) -> anyhow::Result<Url> {
        let mut url = Url::parse(EFETCH_URL)?;
        url.query_pairs_mut()
            .append_pair("db", "pubmed")
            .append_pair("id", &ids.join(","))
            .append_pair("retmode", "xml")
            .append_pair("tool", "pubcite")
            .append_pair("email", &self.email);
        Ok(url)
    }
}

impl RecordSource for EntrezClient {
    fn search(&self, query: &str, retmax: usize) -> anyhow::Result<Vec<String>> {
        let url = self.esearch_url(query, retmax)?;
        let body = self.get(&url)?;
        parse_esearch_ids(&body)
    }

    fn fetch(&self, ids: &[String]) -> anyhow::Result<Vec<Record>> {
        let url = self.efetch_url(ids)?;
        let body = self.get(&url)?;
        let records = record::parse_article_set(&body)
            .context("failed to parse efetch article set")?;
        Ok(records)
    }
}

/// Pull the id list out of an esearch JSON body
/// (`esearchresult.idlist`, an array of strings).
fn parse_esearch_ids(body: &str) -> anyhow::Result<Vec<String>> {
    let value: serde_json::Value =
        serde_json::from_str(body).context("esearch response is not valid JSON")?;
    let idlist = value
        .get("esearchresult")
        .and_then(|r| r.get("idlist"))
        .and_then(|l| l.as_array())
        .context("esearch response has no esearchresult.idlist")?;
    Ok(idlist
        .iter()
        .filter_map(|id| id.as_str())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esearch_ids_come_back_in_order() {
        let body = r#"{
            "header": {"type": "esearch", "version": "0.3"},
            "esearchresult": {
                "count": "2",
                "retmax": "20",
                "idlist": ["29555906", "28123456"]
            }
        }"#;
        let ids = parse_esearch_ids(body).unwrap();
        assert_eq!(ids, vec!["29555906".to_string(), "28123456".to_string()]);
    }

    #[test]
    fn esearch_empty_idlist_is_ok() {
        let body = r#"{"esearchresult": {"count": "0", "idlist": []}}"#;
        assert!(parse_esearch_ids(body).unwrap().is_empty());
    }

    #[test]
    fn esearch_without_idlist_is_an_error() {
        let err = parse_esearch_ids(r#"{"esearchresult": {}}"#).unwrap_err();
        assert!(err.to_string().contains("idlist"));
    }

    #[test]
    fn esearch_garbage_is_an_error() {
        assert!(parse_esearch_ids("<html>down for maintenance</html>").is_err());
    }

    #[test]
    fn search_url_carries_identification_and_limits() {
        let client = EntrezClient::new("someone@example.org");
        let url = client.esearch_url("Tran LM[Author]", 20).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(pairs.contains(&("db".to_string(), "pubmed".to_string())));
        assert!(pairs.contains(&("term".to_string(), "Tran LM[Author]".to_string())));
        assert!(pairs.contains(&("retmax".to_string(), "20".to_string())));
        assert!(pairs.contains(&("email".to_string(), "someone@example.org".to_string())));
    }

    #[test]
    fn fetch_url_joins_ids_with_commas() {
        let client = EntrezClient::new("someone@example.org");
        let ids = vec!["1".to_string(), "2".to_string()];
        let url = client.efetch_url(&ids).unwrap();
        assert!(
            url.query_pairs()
                .any(|(k, v)| k == "id" && v == "1,2")
        );
    }
}
