use std::ffi::OsString;

use super::{SecretSource, Secrets, ServiceSecrets, SourceError};

/// Groups process environment variables by service prefix.
///
/// A variable belongs to service `SVC` when its name starts with `SVC_`; the
/// secret keeps its full variable name. When several configured services
/// match, the longest prefix wins.
#[derive(Debug, Clone)]
pub struct EnvSource {
    services: Vec<String>,
}

impl EnvSource {
    pub fn new(services: Vec<String>) -> Self {
        Self { services }
    }

    fn collect<I>(&self, vars: I) -> Result<Secrets, SourceError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if self.services.is_empty() {
            return Err(SourceError::NoServices);
        }

        let mut secrets = Secrets::new();
        for service in &self.services {
            secrets.insert(service.clone(), ServiceSecrets::new());
        }

        for (key, value) in vars {
            let owner = self
                .services
                .iter()
                .filter(|service| {
                    key.strip_prefix(service.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
                })
                .max_by_key(|service| service.len());

            if let Some(service) = owner {
                secrets.insert(service.clone(), ServiceSecrets::from([(key, value)]));
            }
        }
        Ok(secrets)
    }
}

/// Drops variables whose name or value is not valid Unicode
fn unicode_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                tracing::warn!(%key, "skipping environment variable with a non-unicode value");
                None
            }
            (Err(key), _) => {
                tracing::warn!(key = ?key, "skipping environment variable with a non-unicode name");
                None
            }
        })
}

#[async_trait::async_trait]
impl SecretSource for EnvSource {
    async fn load(&self) -> Result<Secrets, SourceError> {
        self.collect(unicode_vars(std::env::vars_os()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_groups_by_prefix() {
        let source = EnvSource::new(vec!["SERVICE1".to_string(), "SERVICE2".to_string()]);
        let secrets = source
            .collect(vars(&[
                ("SERVICE1_FOO", "foo"),
                ("SERVICE1_BAR", "bar"),
                ("SERVICE2_BAZ", "baz"),
                ("SERVICE10_NOPE", "x"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(secrets.len(), 2);
        let one = secrets.service("SERVICE1").unwrap();
        assert_eq!(one.len(), 2);
        assert_eq!(one["SERVICE1_FOO"], "foo");
        assert_eq!(secrets.service("SERVICE2").unwrap()["SERVICE2_BAZ"], "baz");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let source = EnvSource::new(vec!["APP".to_string(), "APP_DB".to_string()]);
        let secrets = source
            .collect(vars(&[("APP_DB_PASSWORD", "p"), ("APP_TOKEN", "t")]))
            .unwrap();

        assert_eq!(secrets.service("APP").unwrap().len(), 1);
        assert_eq!(secrets.service("APP_DB").unwrap()["APP_DB_PASSWORD"], "p");
    }

    #[test]
    fn test_configured_service_without_vars_is_present() {
        let source = EnvSource::new(vec!["EMPTY".to_string()]);
        let secrets = source.collect(vars(&[("OTHER_X", "1")])).unwrap();
        assert!(secrets.service("EMPTY").unwrap().is_empty());
    }

    #[test]
    fn test_skips_non_unicode_vars() {
        use std::os::unix::ffi::OsStringExt;

        let raw = vec![
            (OsString::from("SERVICE1_GOOD"), OsString::from("ok")),
            (
                OsString::from("SERVICE1_BAD"),
                OsString::from_vec(vec![0xff, 0xfe]),
            ),
            (OsString::from_vec(vec![0xff, 0xfe]), OsString::from("x")),
        ];

        let source = EnvSource::new(vec!["SERVICE1".to_string()]);
        let secrets = source.collect(unicode_vars(raw)).unwrap();
        let one = secrets.service("SERVICE1").unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one["SERVICE1_GOOD"], "ok");
    }

    #[tokio::test]
    async fn test_load_survives_non_unicode_environment() {
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var(
            "STRONGBOX_ENV_TEST_RAW",
            std::ffi::OsStr::from_bytes(&[0xff, 0xfe]),
        );
        std::env::set_var("STRONGBOX_ENV_TEST_TOKEN", "t");

        let source = EnvSource::new(vec!["STRONGBOX_ENV_TEST".to_string()]);
        let secrets = source.load().await.unwrap();
        let service = secrets.service("STRONGBOX_ENV_TEST").unwrap();
        assert_eq!(service.len(), 1);
        assert_eq!(service["STRONGBOX_ENV_TEST_TOKEN"], "t");
    }

    #[test]
    fn test_requires_service() {
        let source = EnvSource::new(vec![]);
        assert!(matches!(
            source.collect(Vec::new()),
            Err(SourceError::NoServices)
        ));
    }
}
