use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::{EtlError, Result};
use crate::models::Dataset;

/// Location of the parameters file when `WDUC_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str =
    "/home/goransm/Analytics/Wikidata/WD_UsageCoverage/wd_percentUsage_Config.xml";
pub const CONFIG_PATH_ENV: &str = "WDUC_CONFIG";

pub const DEFAULT_OUTPUT_PARTITIONS: usize = 10;

const OUTPUT_BASE_PATH_KEY: &str = "output.base_path";
const REQUIRED_TAG: &str = "hdfsPath";

/// XML tag -> configuration key
const XML_KEYS: &[(&str, &str)] = &[
    (REQUIRED_TAG, OUTPUT_BASE_PATH_KEY),
    ("sourcePath", "source.path"),
    ("sourceFormat", "source.format"),
    ("outputPartitions", "output.partitions"),
    ("quoteMode", "output.quote_mode"),
];

/// Environment variable -> configuration key
const ENV_KEYS: &[(&str, &str)] = &[
    ("WDUC_HDFS_PATH", OUTPUT_BASE_PATH_KEY),
    ("WDUC_SOURCE_PATH", "source.path"),
    ("WDUC_SOURCE_FORMAT", "source.format"),
    ("WDUC_OUTPUT_PARTITIONS", "output.partitions"),
    ("WDUC_QUOTE_MODE", "output.quote_mode"),
    ("WDUC_QUERY_TIMEOUT_SECS", "engine.query_timeout_secs"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    pub output: OutputConfig,
    pub source: SourceConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub base_path: String,
    pub partitions: usize,
    pub quote_mode: QuoteMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub path: Option<String>,
    pub format: SourceFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub batch_size: usize,
    pub target_partitions: usize,
    pub query_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get(),
            query_timeout_secs: 0,
        }
    }
}

/// How delimiter-bearing fields are quoted in the written files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteMode {
    /// Quote character is NUL, as the legacy Spark job wrote it
    Disabled,
    /// RFC 4180 double quotes
    Standard,
}

impl QuoteMode {
    pub fn quote_byte(&self) -> u8 {
        match self {
            QuoteMode::Disabled => b'\0',
            QuoteMode::Standard => b'"',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Parquet,
    Csv,
}

impl EtlConfig {
    /// Load the XML parameters file at `path`, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let params = read_params(path)?;
        Self::from_params_with(&params, |name| env::var(name).ok())
    }

    /// Build the configuration from parsed XML parameters.
    ///
    /// `lookup` resolves environment overrides; values it returns take precedence
    /// over the XML values, which take precedence over the defaults.
    pub fn from_params_with<F>(params: &HashMap<String, String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("output.partitions", DEFAULT_OUTPUT_PARTITIONS as i64)?
            .set_default("output.quote_mode", "disabled")?
            .set_default("source.format", "parquet")?
            .set_default("engine.batch_size", 8192_i64)?
            .set_default("engine.target_partitions", num_cpus::get() as i64)?
            .set_default("engine.query_timeout_secs", 0_i64)?;

        for (tag, key) in XML_KEYS {
            if let Some(value) = params.get(*tag) {
                builder = builder.set_override(*key, value.as_str())?;
            }
        }

        for (name, key) in ENV_KEYS {
            if let Some(value) = lookup(name) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let settings = builder.build()?;

        match settings.get_string(OUTPUT_BASE_PATH_KEY) {
            Ok(base_path) if !base_path.trim().is_empty() => {}
            Ok(_) => {
                return Err(EtlError::Config(format!(
                    "required key `{}` is empty",
                    REQUIRED_TAG
                )))
            }
            Err(_) => {
                return Err(EtlError::Config(format!(
                    "required key `{}` is missing",
                    REQUIRED_TAG
                )))
            }
        }

        let config: EtlConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.output.partitions == 0 {
            return Err(EtlError::Config(
                "output partitions must be at least 1".to_string(),
            ));
        }
        if self.engine.batch_size == 0 || self.engine.target_partitions == 0 {
            return Err(EtlError::Config(
                "engine batch size and target partitions must be at least 1".to_string(),
            ));
        }
        // Output is written through the local filesystem; remote stores must be mounted
        if let Some(scheme) = url_scheme(&self.output.base_path) {
            return Err(EtlError::Config(format!(
                "output base path `{}` has a `{}:` URL scheme; only local or mounted paths are supported",
                self.output.base_path, scheme
            )));
        }
        Ok(())
    }

    /// Write target for a dataset: the base path with the dataset name appended verbatim
    pub fn output_path(&self, dataset: Dataset) -> String {
        format!("{}{}", self.output.base_path, dataset.file_name())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        match self.engine.query_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Scheme prefix of a URL-like path (`hdfs:///x`, `s3://b/k`), if any
///
/// Single-letter prefixes are drive letters, not schemes.
fn url_scheme(path: &str) -> Option<&str> {
    let (scheme, _) = path.split_once(':')?;
    let valid = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme.len() > 1
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Path of the parameters file, honouring `WDUC_CONFIG`
pub fn config_path_from_env() -> String {
    let _ = dotenv::dotenv();
    env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Read and parse the XML parameters file at `path`
pub fn read_params(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|e| {
        EtlError::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_params(&xml, &path.display().to_string())
}

/// Flatten an XML document into tag -> text.
///
/// Every element counts, the root included. Text is the trimmed content before
/// the element's first child; elements without text map to an empty string.
/// A repeated tag keeps the value of its last occurrence.
pub fn parse_params(xml: &str, origin: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let xml_error = |source: quick_xml::Error| EtlError::Xml {
        path: origin.to_string(),
        source,
    };

    let mut params = HashMap::new();
    // (tag, still collecting leading text)
    let mut stack: Vec<(String, bool)> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                open_element(&mut params, &mut stack, &mut seen_root, &tag, origin)?;
                stack.push((tag, true));
            }
            Event::Empty(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                open_element(&mut params, &mut stack, &mut seen_root, &tag, origin)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                append_text(&mut params, &stack, &text);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                append_text(&mut params, &stack, &String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some((tag, _)) = stack.last() {
        return Err(EtlError::Config(format!(
            "{}: element <{}> is never closed",
            origin, tag
        )));
    }
    if !seen_root {
        return Err(EtlError::Config(format!("{}: no root element", origin)));
    }

    Ok(params)
}

fn open_element(
    params: &mut HashMap<String, String>,
    stack: &mut [(String, bool)],
    seen_root: &mut bool,
    tag: &str,
    origin: &str,
) -> Result<()> {
    match stack.last_mut() {
        Some((_, collecting)) => *collecting = false,
        None if *seen_root => {
            return Err(EtlError::Config(format!(
                "{}: content after the root element (<{}>)",
                origin, tag
            )))
        }
        None => *seen_root = true,
    }

    if params.insert(tag.to_string(), String::new()).is_some() {
        tracing::warn!("Duplicate configuration tag '{}', last value wins", tag);
    }
    Ok(())
}

fn append_text(params: &mut HashMap<String, String>, stack: &[(String, bool)], text: &str) {
    if let Some((tag, true)) = stack.last() {
        if let Some(value) = params.get_mut(tag) {
            value.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<parameters>
    <hdfsPath>hdfs:///tmp/wmde/analytics/Wikidata/WD_UsageCoverage/</hdfsPath>
    <publicDir>/srv/published/datasets/wmde-analytics-engineering/</publicDir>
</parameters>
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_flat_params() {
        let params = parse_params(SAMPLE, "sample.xml").unwrap();
        assert_eq!(
            params.get("hdfsPath").unwrap(),
            "hdfs:///tmp/wmde/analytics/Wikidata/WD_UsageCoverage/"
        );
        assert_eq!(
            params.get("publicDir").unwrap(),
            "/srv/published/datasets/wmde-analytics-engineering/"
        );
        // The root element is part of the mapping too
        assert_eq!(params.get("parameters").unwrap(), "");
    }

    #[test]
    fn test_duplicate_tag_last_wins() {
        let xml = "<p><hdfsPath>/first/</hdfsPath><hdfsPath>/second/</hdfsPath></p>";
        let params = parse_params(xml, "dup.xml").unwrap();
        assert_eq!(params.get("hdfsPath").unwrap(), "/second/");
    }

    #[test]
    fn test_nested_and_empty_elements() {
        let xml = "<p>head<group><leaf>x &amp; y</leaf><empty/></group><cdata><![CDATA[a<b]]></cdata></p>";
        let params = parse_params(xml, "nested.xml").unwrap();
        assert_eq!(params.get("p").unwrap(), "head");
        assert_eq!(params.get("group").unwrap(), "");
        assert_eq!(params.get("leaf").unwrap(), "x & y");
        assert_eq!(params.get("empty").unwrap(), "");
        assert_eq!(params.get("cdata").unwrap(), "a<b");
    }

    #[test]
    fn test_malformed_xml_is_error() {
        match parse_params("<p><hdfsPath>/out/</p>", "bad.xml") {
            Err(EtlError::Xml { path, .. }) => assert_eq!(path, "bad.xml"),
            other => panic!("expected xml error, got {:?}", other),
        }
        assert!(parse_params("<p><hdfsPath>/out/</hdfsPath>", "open.xml").is_err());
        assert!(parse_params("", "empty.xml").is_err());
        assert!(parse_params("<a/><b/>", "two-roots.xml").is_err());
    }

    #[test]
    fn test_output_paths() {
        let config =
            EtlConfig::from_params_with(&params(&[("hdfsPath", "/out/")]), no_env).unwrap();
        assert_eq!(config.output_path(Dataset::Usage), "/out/wdUsage");
        assert_eq!(config.output_path(Dataset::Coverage), "/out/wdSitelinks");
    }

    #[test]
    fn test_defaults() {
        let config =
            EtlConfig::from_params_with(&params(&[("hdfsPath", "/out/")]), no_env).unwrap();
        assert_eq!(config.output.partitions, 10);
        assert_eq!(config.output.quote_mode, QuoteMode::Disabled);
        assert_eq!(config.source.format, SourceFormat::Parquet);
        assert!(config.source.path.is_none());
        assert_eq!(config.engine.batch_size, 8192);
        assert!(config.query_timeout().is_none());
    }

    #[test]
    fn test_missing_required_key() {
        let result = EtlConfig::from_params_with(&params(&[("publicDir", "/x/")]), no_env);
        match result {
            Err(EtlError::Config(msg)) => assert!(msg.contains("hdfsPath")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_required_key() {
        let result = EtlConfig::from_params_with(&params(&[("hdfsPath", "  ")]), no_env);
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_url_scheme_base_path_rejected() {
        for base in [
            "hdfs:///tmp/wmde/analytics/Wikidata/WD_UsageCoverage/",
            "s3://bucket/prefix/",
            "file:/tmp/out/",
        ] {
            let result = EtlConfig::from_params_with(&params(&[("hdfsPath", base)]), no_env);
            match result {
                Err(EtlError::Config(msg)) => assert!(msg.contains("URL scheme"), "{}", msg),
                other => panic!("expected config error for {}, got {:?}", base, other),
            }
        }
    }

    #[test]
    fn test_local_base_paths_accepted() {
        for base in ["/mnt/hdfs/tmp/wmde/", "out/", "C:/data/", "/srv/a:b/"] {
            let config =
                EtlConfig::from_params_with(&params(&[("hdfsPath", base)]), no_env).unwrap();
            assert_eq!(config.output.base_path, base);
        }
    }

    #[test]
    fn test_xml_values_and_env_overrides() {
        let xml = params(&[
            ("hdfsPath", "/from-xml/"),
            ("sourceFormat", "csv"),
            ("outputPartitions", "4"),
            ("quoteMode", "standard"),
        ]);
        let config = EtlConfig::from_params_with(&xml, |name| match name {
            "WDUC_HDFS_PATH" => Some("/from-env/".to_string()),
            "WDUC_QUERY_TIMEOUT_SECS" => Some("30".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.output.base_path, "/from-env/");
        assert_eq!(config.source.format, SourceFormat::Csv);
        assert_eq!(config.output.partitions, 4);
        assert_eq!(config.output.quote_mode, QuoteMode::Standard);
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero = params(&[("hdfsPath", "/out/"), ("outputPartitions", "0")]);
        assert!(EtlConfig::from_params_with(&zero, no_env).is_err());

        let bad_quote = params(&[("hdfsPath", "/out/"), ("quoteMode", "sometimes")]);
        assert!(EtlConfig::from_params_with(&bad_quote, no_env).is_err());

        let bad_format = params(&[("hdfsPath", "/out/"), ("sourceFormat", "orc")]);
        assert!(EtlConfig::from_params_with(&bad_format, no_env).is_err());
    }

    #[test]
    fn test_read_params_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let params = read_params(file.path()).unwrap();
        assert!(params.contains_key("hdfsPath"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_params(dir.path().join("absent.xml"));
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_quote_bytes() {
        assert_eq!(QuoteMode::Disabled.quote_byte(), 0);
        assert_eq!(QuoteMode::Standard.quote_byte(), b'"');
    }
}
