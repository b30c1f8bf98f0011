use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page-level outcome in the shape page renderers expect:
/// `{ "props": {..} }`, `{ "redirect": {..} }` or `{ "notFound": true }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageResult {
    Redirect {
        redirect: Redirect,
    },
    NotFound {
        #[serde(rename = "notFound")]
        not_found: bool,
    },
    Props {
        props: Map<String, Value>,
    },
}

impl PageResult {
    pub fn props(props: Map<String, Value>) -> Self {
        PageResult::Props { props }
    }

    pub fn redirect(destination: impl Into<String>, permanent: bool) -> Self {
        PageResult::Redirect {
            redirect: Redirect {
                destination: destination.into(),
                permanent,
            },
        }
    }

    pub fn not_found() -> Self {
        PageResult::NotFound { not_found: true }
    }
}

impl Default for PageResult {
    fn default() -> Self {
        PageResult::Props { props: Map::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub destination: String,
    pub permanent: bool,
}

/// Output of one unit: data for dependent units plus an optional page result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<PageResult>,
}

impl UnitResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = Some(PageResult::props(props));
        self
    }

    pub fn with_result(mut self, result: PageResult) -> Self {
        self.props = Some(result);
        self
    }
}
