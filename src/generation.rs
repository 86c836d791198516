//! Generative text collaborator for segment names and traits.
//!
//! Defines the [`SegmentGenerator`] trait and concrete implementations:
//! - **[`DisabledGenerator`]**: always fails, so the segmenter uses its fallback.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions` with a JSON response format.
//! - **[`OllamaGenerator`]**: `POST /api/chat` on a local Ollama instance with `format: "json"`.
//!
//! Every failure mode (transport error, non-2xx status, timeout, non-JSON
//! content, schema mismatch) is reported as
//! [`TargetingError::GenerationService`]. The caller decides what to do
//! with it; the segmenter always degrades to deterministic segments.
//!
//! # Expected Response
//!
//! ```json
//! { "segments": [ { "name": "...", "traits": "..." } ] }
//! ```
//!
//! A bare JSON array of the same objects is accepted too, and Markdown code
//! fences around the payload are stripped before parsing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{Result, TargetingError};

/// One segment as returned by the generator, before quota allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSegment {
    pub name: String,
    pub traits: String,
}

/// A top-ranked feature reduced to what the generator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureContext {
    pub name: String,
    /// First clause of the feature's justification.
    pub basis: String,
}

/// Everything the generator is told about one segmentation run.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentBrief {
    pub product: String,
    pub total_count: u64,
    pub frequency: u32,
    pub segment_count: usize,
    pub features: Vec<FeatureContext>,
    pub name_max_chars: usize,
    pub traits_max_chars: usize,
    pub traits_max_lines: usize,
}

/// A generative backend that proposes segment names and traits.
#[async_trait]
pub trait SegmentGenerator: Send + Sync {
    /// Backend identifier used in logs (e.g. `"openai:gpt-4o"`).
    fn name(&self) -> &str;

    /// Produce segment proposals for `brief`. Implementations make exactly
    /// one call to their service and never retry.
    async fn generate(&self, brief: &SegmentBrief) -> Result<Vec<RawSegment>>;
}

// ============ Prompt ============

/// Instruction template carrying the count, length, and weighting constraints.
///
/// The 40/30/30 thematic weighting is guidance for the service only; the
/// returned mix is not checked.
pub fn system_prompt(brief: &SegmentBrief) -> String {
    format!(
        r#"당신은 글로벌 톱티어 브랜드 마케팅 전략가이자 데이터 사이언티스트입니다.
브랜드의 유산, 시장의 현재 트렌드, 그리고 추출된 데이터 피처의 상관관계를 분석하여 고도화된 세그먼테이션 리포트를 작성하세요.

수행 가이드:
1. 수량 및 비중 준수: 총 {count}개의 세그먼트를 생성하되, 다음의 비중을 반드시 지키세요.
   - 상품 특성 반영 (40%): 브랜드 고유의 셀링 포인트에 결합된 타겟군.
   - 가격 민감도 반영 (30%): 구매력, 실속 소비, 프리미엄 선호 등 경제 활동 중심 타겟군.
   - 시장 트렌드 반영 (30%): 최신 테크 뉴스, 커뮤니티 이슈 등 외부 트렌드 중심 타겟군.
2. 데이터-기능 연계 분석: 각 세그먼트는 상품의 핵심 가치와 피처를 논리적으로 연결해야 합니다.
3. 세그먼트 특징(traits): 최대 {lines}줄(약 {traits_chars}자 내외)로 핵심만 요약하세요.
4. 세그먼트 명칭(name): 공백 포함 {name_chars}자 미만으로 짧고 강렬하게 작성하세요.

출력 형식 (JSON):
{{"segments": [{{"name": "후킹 포인트 ({name_chars}자 미만)", "traits": "{lines}줄 이내의 핵심 요약 특징"}}]}}"#,
        count = brief.segment_count,
        lines = brief.traits_max_lines,
        traits_chars = brief.traits_max_chars,
        name_chars = brief.name_max_chars,
    )
}

/// Context payload: product, volumes, and feature summaries.
pub fn user_prompt(brief: &SegmentBrief) -> String {
    let features = brief
        .features
        .iter()
        .map(|f| format!("{} (근거: {})", f.name, f.basis))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "상품명: {}\n발송 계획: {}명 대상 총 {}회의 발송 기간 동안 {}개의 세그먼트로 분류\n핵심 유효 피처: [{}]\n\n위 데이터를 기반으로 반드시 정확히 {}개의 세그먼트를 생성해줘.",
        brief.product,
        brief.total_count,
        brief.frequency,
        brief.segment_count,
        features,
        brief.segment_count
    )
}

// ============ Response parsing ============

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentsPayload {
    Envelope { segments: Vec<RawSegment> },
    List(Vec<RawSegment>),
}

/// Parse the service's text output into segment proposals.
pub fn parse_segments_response(text: &str) -> Result<Vec<RawSegment>> {
    let cleaned = strip_code_fence(text);
    let payload: SegmentsPayload = serde_json::from_str(cleaned).map_err(|e| {
        TargetingError::GenerationService(format!("unparseable segment payload: {}", e))
    })?;
    Ok(match payload {
        SegmentsPayload::Envelope { segments } => segments,
        SegmentsPayload::List(segments) => segments,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn service_err(context: &str, e: impl Display) -> TargetingError {
    TargetingError::GenerationService(format!("{}: {}", context, e))
}

// ============ Disabled Generator ============

/// Generator used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl SegmentGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        Err(TargetingError::GenerationService(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Generator ============

/// Chat-completions backend. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    label: String,
    model: String,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            label: format!("openai:{}", model),
            model,
            temperature: config.temperature,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl SegmentGenerator for OpenAIGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt(brief) },
                { "role": "user", "content": user_prompt(brief) },
            ],
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| service_err("OpenAI request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(service_err(
                "OpenAI API error",
                format!("{} {}", status, body_text),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| service_err("OpenAI response not JSON", e))?;
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                TargetingError::GenerationService(
                    "Invalid OpenAI response: missing message content".to_string(),
                )
            })?;

        parse_segments_response(content)
    }
}

// ============ Ollama Generator ============

/// Local Ollama chat backend (default URL `http://localhost:11434`).
pub struct OllamaGenerator {
    label: String,
    model: String,
    temperature: f32,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            label: format!("ollama:{}", model),
            model,
            temperature: config.temperature,
            url,
            client,
        })
    }
}

#[async_trait]
impl SegmentGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "format": "json",
            "options": { "temperature": self.temperature },
            "messages": [
                { "role": "system", "content": system_prompt(brief) },
                { "role": "user", "content": user_prompt(brief) },
            ],
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                service_err(
                    &format!("Ollama connection error (is Ollama running at {}?)", self.url),
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(service_err(
                "Ollama API error",
                format!("{} {}", status, body_text),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| service_err("Ollama response not JSON", e))?;
        let content = json
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                TargetingError::GenerationService(
                    "Invalid Ollama response: missing message content".to_string(),
                )
            })?;

        parse_segments_response(content)
    }
}

/// Create the configured [`SegmentGenerator`].
///
/// | Config Value | Generator |
/// |-------------|-----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"openai"` | [`OpenAIGenerator`] |
/// | `"ollama"` | [`OllamaGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Box<dyn SegmentGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}
