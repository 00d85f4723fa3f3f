use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::llm::{FragmentStream, LlmError};

/// The answer as it is generated, handed to the caller one fragment per poll.
///
/// `None` marks the end of the answer. A failure arrives as a single `Err`
/// and nothing is yielded after it. Dropping the stream abandons the
/// remaining generation.
pub struct AnswerStream {
    inner: Option<FragmentStream>,
}

impl AnswerStream {
    pub fn new(inner: FragmentStream) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for AnswerStream {
    type Item = Result<String, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(Err(e))) => {
                self.inner = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("finished", &self.is_finished())
            .finish()
    }
}
