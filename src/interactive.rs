use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use thiserror::Error;

pub const EDITOR_URI: &str = "plugcheck://vst/editor";

/// A navigation target: base uri plus ordered query params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriQuery {
    uri: String,
    params: Vec<(String, String)>,
}

impl UriQuery {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            params: Vec::new(),
        }
    }

    pub fn add_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.push((key.into(), value.to_string()));
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.add_param(key, value);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for UriQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no view registered for {0}")]
    UnknownRoute(String),
    #[error("missing parameter '{param}' for {uri}")]
    MissingParam { uri: String, param: String },
    #[error("invalid parameter '{param}' for {uri}: {reason}")]
    InvalidParam {
        uri: String,
        param: String,
        reason: String,
    },
}

pub trait Interactive {
    fn open(&self, query: &UriQuery) -> Result<(), NavigationError>;
}

impl<T: Interactive + ?Sized> Interactive for std::sync::Arc<T> {
    fn open(&self, query: &UriQuery) -> Result<(), NavigationError> {
        (**self).open(query)
    }
}

type Route = Box<dyn Fn(&UriQuery) -> Result<(), NavigationError> + Send + Sync>;

/// Opens views by looking their base uri up in a route table.
#[derive(Default)]
pub struct Navigator {
    routes: RwLock<HashMap<String, Route>>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, uri: impl Into<String>, view: F)
    where
        F: Fn(&UriQuery) -> Result<(), NavigationError> + Send + Sync + 'static,
    {
        self.routes.write().insert(uri.into(), Box::new(view));
    }
}

impl Interactive for Navigator {
    fn open(&self, query: &UriQuery) -> Result<(), NavigationError> {
        let routes = self.routes.read();
        let view = routes
            .get(query.uri())
            .ok_or_else(|| NavigationError::UnknownRoute(query.uri().to_string()))?;
        tracing::debug!(%query, "opening view");
        view(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn renders_params_in_order() {
        let query = UriQuery::new(EDITOR_URI)
            .with_param("instanceId", 3)
            .with_param("tab", "params");
        assert_eq!(
            query.to_string(),
            "plugcheck://vst/editor?instanceId=3&tab=params"
        );
        assert_eq!(query.param("instanceId"), Some("3"));
        assert_eq!(query.param("missing"), None);
        assert_eq!(UriQuery::new(EDITOR_URI).to_string(), EDITOR_URI);
    }

    #[test]
    fn routes_by_base_uri() {
        let opened = Arc::new(Mutex::new(Vec::new()));
        let navigator = Navigator::new();
        let log = opened.clone();
        navigator.register(EDITOR_URI, move |query| {
            log.lock().push(query.to_string());
            Ok(())
        });

        let query = UriQuery::new(EDITOR_URI).with_param("instanceId", 0);
        navigator.open(&query).unwrap();
        assert_eq!(*opened.lock(), vec!["plugcheck://vst/editor?instanceId=0"]);

        let err = navigator.open(&UriQuery::new("plugcheck://nowhere")).unwrap_err();
        assert!(matches!(err, NavigationError::UnknownRoute(uri) if uri == "plugcheck://nowhere"));
    }
}
