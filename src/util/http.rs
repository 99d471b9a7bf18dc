use super::basic::SError;

/// Used to permit multiple http get implementations/libraries.
///
/// async_trait is required to be able to instantiate a Box<dyn HttpRequester>
/// of this, since returning Futures from trait objects is not otherwise
/// possible. This is marked ?Send, as nothing here needs to cross threads.
///
/// Also note that we're doing this rather than simply passing around a function pointer
/// because you aren't allowed to have raw async function pointers.
#[async_trait::async_trait(?Send)]
pub trait HttpRequester {
    async fn get(&self, url: &str) -> Result<String, SError>;
}

#[cfg(feature = "http_standalone")]
pub mod standalone {
    use crate::util::basic::SError;

    use super::HttpRequester;

    pub struct StandaloneAppRequester;

    impl StandaloneAppRequester {
        pub fn new() -> StandaloneAppRequester {
            StandaloneAppRequester{}
        }

        pub fn new_boxed() -> Box<StandaloneAppRequester> {
            Box::new(StandaloneAppRequester::new())
        }
    }

    #[async_trait::async_trait(?Send)]
    impl HttpRequester for StandaloneAppRequester {
        async fn get(&self, url: &str) -> Result<String, SError> {
            // surf has no dependence on tokio, so this can simply be run
            // under async_std::task::block_on.
            let mut resp = surf::get(url).await
                .map_err(|e| format!("{}", e))?;
            if !resp.status().is_success() {
                return Err(format!("status: {}", resp.status()));
            }
            let body_text = resp.body_string().await
                .map_err(|e| format!("{}", e))?;
            Ok(body_text)
        }
    }
}

// Used by both unit and integration tests
pub mod pub_testlib {
    use std::collections::HashMap;

    use crate::util::{basic::SError, rc::RcRefCell};

    use super::HttpRequester;

    /// Returns canned bodies by url, and records which urls were requested.
    pub struct CannedHttpRequester {
        pub bodies: HashMap<String, String>,
        pub requested: RcRefCell<Vec<String>>,
    }

    #[async_trait::async_trait(?Send)]
    impl HttpRequester for CannedHttpRequester {
        async fn get(&self, url: &str) -> Result<String, SError> {
            self.requested.borrow_mut().push(url.to_string());
            self.bodies.get(url).cloned()
                .ok_or_else(|| format!("404 for {}", url))
        }
    }
}
