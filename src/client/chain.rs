//! The interceptor pipeline around a single dispatch.

use std::collections::VecDeque;

use crate::config::RequestConfig;
use crate::dispatch::Dispatcher;
use crate::interceptor::{Interceptor, Interceptors};
use crate::response::Response;
use crate::Error;

/// A snapshot of the interceptors registered when the request was made.
///
/// Request stages run front to back, then dispatch, then response stages. Each
/// stage sees the outcome of the previous one; an error skips every stage
/// without a rejection handler.
#[derive(Debug)]
pub(crate) struct Pipeline {
    request: VecDeque<Interceptor<RequestConfig>>,
    response: Vec<Interceptor<Response>>,
}

impl Pipeline {
    pub(crate) fn new(interceptors: &Interceptors) -> Self {
        let mut request = VecDeque::new();
        interceptors
            .request
            .for_each(|_, interceptor| request.push_front(interceptor.clone()));

        let mut response = Vec::new();
        interceptors
            .response
            .for_each(|_, interceptor| response.push(interceptor.clone()));

        Self { request, response }
    }

    pub(crate) async fn run(self, dispatcher: &Dispatcher, config: RequestConfig) -> Result<Response, Error> {
        let mut state = Ok(config);
        for stage in &self.request {
            state = stage.settle(state).await;
        }

        let mut state = match state {
            Ok(config) => dispatcher.dispatch(config).await,
            Err(error) => Err(error),
        };

        for stage in &self.response {
            state = stage.settle(state).await;
        }
        state
    }
}
