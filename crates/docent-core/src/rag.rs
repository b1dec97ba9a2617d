//! Grounded answering: retrieve the nearest chunks, then let the generation
//! provider phrase an answer from them alone.

use std::fmt::Write as _;
use std::sync::Arc;

use docent_llm::{AnyProvider, ChatStream, LlmError, LlmProvider};
use docent_memory::{DocumentError, Retriever, SearchHit};

/// Reply used when no chunk of any `ready` document is available.
pub const NO_DOCUMENTS_REPLY: &str =
    "No relevant documents found. Please upload some documents first.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Retrieval(#[from] DocumentError),
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchHit>,
}

pub struct StreamingAnswer {
    pub sources: Vec<SearchHit>,
    pub tokens: ChatStream,
}

impl std::fmt::Debug for StreamingAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAnswer")
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}

pub struct RagService {
    retriever: Arc<Retriever>,
    provider: Arc<AnyProvider>,
}

impl std::fmt::Debug for RagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagService")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl RagService {
    #[must_use]
    pub fn new(retriever: Arc<Retriever>, provider: Arc<AnyProvider>) -> Self {
        Self {
            retriever,
            provider,
        }
    }

    /// # Errors
    ///
    /// Returns a retrieval error (including `InvalidArgument` for `Some(0)`), or a
    /// generation error.
    pub async fn answer(&self, question: &str, top_k: Option<usize>) -> Result<Answer, RagError> {
        let sources = self.retriever.search(question, top_k).await?;
        if sources.is_empty() {
            return Ok(Answer {
                text: NO_DOCUMENTS_REPLY.to_owned(),
                sources,
            });
        }

        let prompt = build_prompt(question, &sources);
        let text = self.provider.generate(&prompt).await?;
        tracing::debug!(sources = sources.len(), "generated grounded answer");
        Ok(Answer { text, sources })
    }

    /// Like [`RagService::answer`] but yields the answer as it is generated.
    ///
    /// # Errors
    ///
    /// Same as [`RagService::answer`]; errors after the stream starts arrive as
    /// stream items.
    pub async fn answer_stream(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<StreamingAnswer, RagError> {
        let sources = self.retriever.search(question, top_k).await?;
        if sources.is_empty() {
            let reply: ChatStream =
                Box::pin(futures::stream::once(async { Ok(NO_DOCUMENTS_REPLY.to_owned()) }));
            return Ok(StreamingAnswer {
                sources,
                tokens: reply,
            });
        }

        let prompt = build_prompt(question, &sources);
        let tokens = self.provider.generate_stream(&prompt).await?;
        Ok(StreamingAnswer { sources, tokens })
    }
}

/// Prompt that restricts the model to the retrieved context.
#[must_use]
pub fn build_prompt(question: &str, sources: &[SearchHit]) -> String {
    let context = sources
        .iter()
        .map(|hit| hit.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    let mut prompt = String::with_capacity(context.len() + question.len() + 256);
    prompt.push_str(
        "You are a helpful assistant. Answer the question using ONLY the context below.\n\
         If the context does not contain the answer, reply exactly: \
         \"I don't have enough information to answer that.\"\n\n",
    );
    let _ = write!(prompt, "Context:\n{context}\n\nQuestion: {question}\n\nAnswer:\n");
    prompt
}
