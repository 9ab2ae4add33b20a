//! Dotenv files: parsing for the secret source, formatting for key delivery

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{SecretSource, Secrets, ServiceSecrets, SourceError};

const EXTENSION: &str = ".env";

/// Loads one service per file; `foo-db.env` holds the secrets of `foo-db`
#[derive(Debug, Clone)]
pub struct DotenvSource {
    paths: Vec<PathBuf>,
}

impl DotenvSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait::async_trait]
impl SecretSource for DotenvSource {
    async fn load(&self) -> Result<Secrets, SourceError> {
        if self.paths.is_empty() {
            return Err(SourceError::NoServices);
        }

        let mut secrets = Secrets::new();
        for path in &self.paths {
            let service = service_name(path)?;
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
            let vars = parse(&text).map_err(|line| SourceError::InvalidLine {
                path: path.clone(),
                line,
            })?;
            tracing::debug!(service, secrets = vars.len(), file = %path.display(), "loaded dotenv file");
            secrets.insert(service, vars);
        }
        Ok(secrets)
    }
}

fn service_name(path: &Path) -> Result<String, SourceError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SourceError::InvalidFileName(path.to_path_buf()))?;
    let service = file_name.strip_suffix(EXTENSION).unwrap_or(file_name);
    if service.is_empty() {
        return Err(SourceError::InvalidFileName(path.to_path_buf()));
    }
    Ok(service.to_string())
}

/// Parse `KEY=VALUE` lines.
///
/// Blank lines and `#` comments are skipped, trailing ` #` comments are
/// dropped from unquoted values, and one pair of surrounding quotes is
/// removed. Inside double quotes `\n`, `\"` and `\\` are unescaped, which is
/// what [`format`] produces for multi-line values such as PEM keys.
///
/// On failure returns the 1-based number of the offending line.
pub fn parse(text: &str) -> Result<ServiceSecrets, usize> {
    let mut vars = HashMap::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or(i + 1)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(i + 1);
        }
        vars.insert(key.to_string(), parse_value(value.trim()));
    }
    Ok(vars)
}

fn parse_value(value: &str) -> String {
    if let Some(rest) = value.strip_prefix('"') {
        if let Some(end) = closing_quote(rest) {
            return unescape(&rest[..end]);
        }
    }
    if let Some(rest) = value.strip_prefix('\'') {
        if let Some(end) = rest.find('\'') {
            return rest[..end].to_string();
        }
    }

    let value = match value.find(" #") {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    };
    value.trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// Index of the first unescaped `"` in `s`
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(idx),
            _ => {}
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Format variables as double-quoted `KEY="value"` lines.
///
/// Newlines, quotes and backslashes are escaped so a PEM key fits on one line
/// of a dotenv or systemd environment file.
pub fn format<K, V>(vars: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (key, value) in vars {
        let escaped = value
            .as_ref()
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n");
        out.push_str(&std::format!("{}=\"{}\"\n", key.as_ref(), escaped));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let text = r#"
# database credentials
SERVICE1_FOO=foovalue
SERVICE1_BAR="bar value" # trailing comment
SERVICE1_BAZ='baz'
SERVICE1_URL=postgres://u:p@host/db?x=y #comment
EMPTY=
"#;
        let vars = parse(text).unwrap();
        assert_eq!(vars.len(), 5);
        assert_eq!(vars["SERVICE1_FOO"], "foovalue");
        assert_eq!(vars["SERVICE1_BAR"], "bar value");
        assert_eq!(vars["SERVICE1_BAZ"], "baz");
        assert_eq!(vars["SERVICE1_URL"], "postgres://u:p@host/db?x=y");
        assert_eq!(vars["EMPTY"], "");
    }

    #[test]
    fn test_parse_invalid_line() {
        assert_eq!(parse("A=1\nnot a pair\n"), Err(2));
        assert_eq!(parse("=value"), Err(1));
    }

    #[test]
    fn test_format_then_parse_multiline_key() {
        let pem = "-----BEGIN ED25519 PRIVATE KEY-----\nAAAA\"\\\n-----END ED25519 PRIVATE KEY-----\n";
        let text = format(&[("MY_PRIVATE_KEY", pem)]);
        assert_eq!(text.lines().count(), 1);

        let vars = parse(&text).unwrap();
        assert_eq!(vars["MY_PRIVATE_KEY"], pem);
    }

    #[test]
    fn test_service_name() {
        assert_eq!(service_name(Path::new("/etc/foo-db.env")).unwrap(), "foo-db");
        assert_eq!(service_name(Path::new("svc")).unwrap(), "svc");
        assert!(service_name(Path::new("/etc/.env")).is_err());
    }

    #[tokio::test]
    async fn test_load_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("svc-a.env");
        let b = dir.path().join("svc-b.env");
        std::fs::write(&a, "DB_PASSWORD=s3cr3t\n").unwrap();
        std::fs::write(&b, "# nothing but a comment\nAPI_KEY=\"k\"\n").unwrap();

        let secrets = DotenvSource::new(vec![a, b]).load().await.unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets.service("svc-a").unwrap()["DB_PASSWORD"], "s3cr3t");
        assert_eq!(secrets.service("svc-b").unwrap()["API_KEY"], "k");
    }

    #[tokio::test]
    async fn test_load_errors() {
        let dir = tempfile::TempDir::new().unwrap();

        assert!(matches!(
            DotenvSource::new(vec![]).load().await,
            Err(SourceError::NoServices)
        ));

        let missing = dir.path().join("missing.env");
        assert!(matches!(
            DotenvSource::new(vec![missing]).load().await,
            Err(SourceError::Io { .. })
        ));

        let bad = dir.path().join("bad.env");
        std::fs::write(&bad, "A=1\nB=2\noops\n").unwrap();
        assert!(matches!(
            DotenvSource::new(vec![bad]).load().await,
            Err(SourceError::InvalidLine { line: 3, .. })
        ));
    }
}
