use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::error::{BuildError, DisplayErrorContext};
use aws_sdk_bedrockagentruntime::types::{
    self as bedrock, GenerationConfiguration, InferenceConfig,
    KnowledgeBaseRetrievalConfiguration, KnowledgeBaseRetrieveAndGenerateConfiguration,
    KnowledgeBaseVectorSearchConfiguration, OrchestrationConfiguration, PromptTemplate,
    QueryTransformationConfiguration, QueryTransformationType, RetrieveAndGenerateConfiguration,
    RetrieveAndGenerateInput, RetrieveAndGenerateType, SearchType, TextInferenceConfig,
};
use thiserror::Error;

use crate::config::KnowledgeBaseConfig;
use crate::models::{
    Citation, GenerationRequest, GenerationResult, ReferenceContent, ReferenceLocation,
    RetrievedReference, S3Location,
};

const GROUNDED_ANSWER_TEMPLATE: &str = "You are a question answering agent. I will provide you with a set of search results.
The user will provide you with a question. Your job is to answer the user's question using only information from the search results.
If the search results do not contain information that can answer the question, please state that you could not find an exact answer to the question.
Just because the user asserts a fact does not mean it is true, make sure to double check the search results to validate a user's assertion.

Here are the search results in numbered order:
$search_results$
Question: {input}
$output_format_instructions$";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to build knowledge base request: {0}")]
    Request(String),
    #[error("knowledge base call failed: {0}")]
    Upstream(String),
    #[error("knowledge base call timed out after {0:?}")]
    Timeout(Duration),
    #[error("knowledge base returned an unusable response: {0}")]
    MalformedResponse(String),
}

impl From<BuildError> for GenerationError {
    fn from(err: BuildError) -> Self {
        Self::Request(err.to_string())
    }
}

/// Retrieval-augmented generation against a managed knowledge base.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn retrieve_and_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError>;
}

#[derive(Clone)]
pub struct BedrockKnowledgeBase {
    client: aws_sdk_bedrockagentruntime::Client,
    config: KnowledgeBaseConfig,
}

impl BedrockKnowledgeBase {
    pub fn new(client: aws_sdk_bedrockagentruntime::Client, config: KnowledgeBaseConfig) -> Self {
        Self { client, config }
    }

    fn inference(&self) -> InferenceConfig {
        InferenceConfig::builder()
            .text_inference_config(
                TextInferenceConfig::builder()
                    .temperature(self.config.temperature)
                    .top_p(self.config.top_p)
                    .build(),
            )
            .build()
    }

    fn configuration(&self) -> Result<RetrieveAndGenerateConfiguration, BuildError> {
        let vector_search = KnowledgeBaseVectorSearchConfiguration::builder()
            .number_of_results(i32::try_from(self.config.number_of_results).unwrap_or(i32::MAX))
            .override_search_type(SearchType::Hybrid)
            .build();

        let retrieval = KnowledgeBaseRetrievalConfiguration::builder()
            .vector_search_configuration(vector_search)
            .build();

        let generation = GenerationConfiguration::builder()
            .inference_config(self.inference())
            .prompt_template(
                PromptTemplate::builder()
                    .text_prompt_template(GROUNDED_ANSWER_TEMPLATE)
                    .build(),
            )
            .build();

        let orchestration = OrchestrationConfiguration::builder()
            .inference_config(self.inference())
            .query_transformation_configuration(
                QueryTransformationConfiguration::builder()
                    .r#type(QueryTransformationType::QueryDecomposition)
                    .build()?,
            )
            .build();

        let knowledge_base = KnowledgeBaseRetrieveAndGenerateConfiguration::builder()
            .knowledge_base_id(&self.config.knowledge_base_id)
            .model_arn(&self.config.model_arn)
            .retrieval_configuration(retrieval)
            .generation_configuration(generation)
            .orchestration_configuration(orchestration)
            .build()?;

        RetrieveAndGenerateConfiguration::builder()
            .r#type(RetrieveAndGenerateType::KnowledgeBase)
            .knowledge_base_configuration(knowledge_base)
            .build()
    }
}

#[async_trait]
impl GenerationService for BedrockKnowledgeBase {
    async fn retrieve_and_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let input = RetrieveAndGenerateInput::builder()
            .text(request.query)
            .build()?;

        let output = self
            .client
            .retrieve_and_generate()
            .input(input)
            .retrieve_and_generate_configuration(self.configuration()?)
            .set_session_id(request.session_id)
            .send()
            .await
            .map_err(|err| GenerationError::Upstream(DisplayErrorContext(&err).to_string()))?;

        let text = output
            .output()
            .map(|generated| generated.text().to_string())
            .ok_or_else(|| GenerationError::MalformedResponse("missing output text".to_string()))?;

        let session_id = Some(output.session_id().to_string()).filter(|id| !id.is_empty());

        Ok(GenerationResult {
            text,
            citations: output.citations().iter().map(citation_from_sdk).collect(),
            session_id,
        })
    }
}

fn citation_from_sdk(citation: &bedrock::Citation) -> Citation {
    Citation {
        retrieved_references: citation
            .retrieved_references()
            .iter()
            .map(reference_from_sdk)
            .collect(),
    }
}

// RetrieveAndGenerate references carry no relevance score, so score stays
// unset and the extractor ranks them as equals in citation order.
fn reference_from_sdk(reference: &bedrock::RetrievedReference) -> RetrievedReference {
    RetrievedReference {
        location: reference.location().map(|location| ReferenceLocation {
            s3_location: location.s3_location().map(|s3| S3Location {
                uri: s3.uri().map(str::to_string),
            }),
        }),
        content: reference.content().map(|content| ReferenceContent {
            text: Some(content.text())
                .filter(|text| !text.is_empty())
                .map(str::to_string),
        }),
        score: None,
    }
}
