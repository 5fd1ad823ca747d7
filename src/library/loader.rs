use tokio::sync::watch;
use tracing::debug;

use super::{Catalog, FilterState, ResultPage};
use crate::store::VideoStore;

/// Loads result pages so that only the newest request delivers a result.
///
/// Each `load` takes the next generation number. Starting a newer load
/// cancels the in-flight query of every older one, which then returns `None`.
pub struct PageLoader<S> {
    catalog: Catalog<S>,
    generation: watch::Sender<u64>,
}

impl<S: VideoStore> PageLoader<S> {
    pub fn new(catalog: Catalog<S>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            catalog,
            generation,
        }
    }

    pub fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    pub async fn load(&self, filter: &FilterState) -> Option<ResultPage> {
        let mut ticket = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            ticket = *g;
        });
        let mut newer = self.generation.subscribe();

        tokio::select! {
            page = self.catalog.page(filter) => {
                if *self.generation.borrow() == ticket {
                    Some(page)
                } else {
                    debug!(ticket, "discarding stale page");
                    None
                }
            }
            _ = newer.wait_for(|g| *g != ticket) => {
                debug!(ticket, "page load superseded");
                None
            }
        }
    }
}
