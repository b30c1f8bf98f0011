use crate::{PageResult, UnitResult};
use async_trait::async_trait;
use serde_json::Map;
use stageruntime::{ResultConsumer, ResultTable};

/// Folds unit results into one page result.
///
/// Units are visited in declaration order. The first redirect ends the walk,
/// then the first not-found; otherwise props objects are merged with later
/// units overwriting keys set by earlier ones.
pub struct PagePropsMerger;

impl PagePropsMerger {
    pub fn merge<'a>(results: impl IntoIterator<Item = &'a UnitResult>) -> PageResult {
        let mut merged = Map::new();

        for result in results {
            match &result.props {
                Some(PageResult::Redirect { redirect }) => {
                    tracing::debug!("Unit redirected to {}", redirect.destination);
                    return PageResult::Redirect {
                        redirect: redirect.clone(),
                    };
                }
                Some(PageResult::NotFound { not_found }) => {
                    return PageResult::NotFound {
                        not_found: *not_found,
                    };
                }
                Some(PageResult::Props { props }) => {
                    merged.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                None => {}
            }
        }

        PageResult::Props { props: merged }
    }
}

#[async_trait]
impl ResultConsumer<UnitResult> for PagePropsMerger {
    type Output = PageResult;

    async fn consume(&self, results: ResultTable<UnitResult>) -> PageResult {
        Self::merge(results.iter().map(|result| result.as_ref()))
    }
}
