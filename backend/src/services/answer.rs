//! Retrieval-answer orchestrator.
//!
//! Embed → search → filter → schema fetch → sufficiency judgment → schema
//! text → optimization → answer → reference extraction → citation expansion
//! → accuracy → persist. Stages run strictly in order; recoverable stages
//! are wrapped by the recovery controller, and an empty retrieval or an
//! insufficient schema takes the general-knowledge fallback path.

use std::sync::Arc;

use tracing::info;

use ai::parse::{parse_stage_reply, FilterResponse, SufficiencyResponse};
use ai::prompts::{self, INSUFFICIENT_MARKER, REFERENCED_NODES_HEADER};
use ai::{generate_schema_text, Backend, LlmService};
use mindgraph_models::{AnswerRequest, AnswerResponse, ReferencedNode, SearchHit, SourceRef};

use crate::errors::AppError;
use crate::services::accuracy::compute_accuracy;
use crate::services::recovery::{run_stage, StageContext, StageOutcome};
use crate::state::AppState;

/// Optimized schema text shorter than this is assumed broken.
const MIN_OPTIMIZED_SCHEMA_CHARS: usize = 10;
/// Cap applied when the recovery plan asks to simplify the schema.
const SIMPLIFIED_SCHEMA_CHARS: usize = 1000;

pub async fn answer(state: &AppState, request: AnswerRequest) -> Result<AnswerResponse, AppError> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation("question 파라미터가 필요합니다.".into()));
    }
    let backend = Backend::parse(&request.model)
        .ok_or_else(|| AppError::Validation(format!("지원하지 않는 모델: {}", request.model)))?;
    let llm = state.llm_for(backend, Some(&request.model_name))?;

    // brain_id is numeric in relational records, string in graph and vector
    // payloads; the conversion lives here at the orchestrator boundary.
    let brain_id = request.brain_id.to_string();
    let question = request.question.clone();
    info!("📋 [1] 질문 수신 | 모델: {} ({})", llm.model_name(), request.model);

    state.vectors.ensure_collection(&brain_id).await?;

    // Stage 1: embed the question and search the brain's collection.
    info!("🔍 [2] 유사 노드 검색 중...");
    let question_vec = state.embedder.encode(&question).await?;
    let outcome = state
        .vectors
        .search(&brain_id, question_vec, state.config.search_k)
        .await?;
    let quality = outcome.quality;
    let mut candidates = outcome.hits;
    if candidates.is_empty() {
        info!("⚠️  [3] 관련 노드 없음 → 일반 지식으로 답변 생성");
        return fallback_answer(state, &llm, &question, request.session_id).await;
    }

    let mut ctx = StageContext {
        question: question.clone(),
        node_count: Some(candidates.len()),
        schema_node_count: None,
    };

    // Stage 2: node-quality filter. A skip keeps the unfiltered candidates.
    info!("🤖 [3] AI Agent: 노드 품질 평가 중... (검색된 노드: {}개)", candidates.len());
    let filter_outcome = run_stage(&llm, "노드 품질 평가", &ctx, |_| {
        let llm = llm.clone();
        let question = question.clone();
        let hits = candidates.clone();
        async move {
            let pairs: Vec<(String, f32)> =
                hits.iter().map(|h| (h.name.clone(), h.score)).collect();
            let reply = llm.chat(&prompts::node_quality_prompt(&question, &pairs)).await?;
            let parsed: FilterResponse = parse_stage_reply(&reply);
            Ok::<_, AppError>(apply_filter(hits, &parsed.filtered_node_names))
        }
    })
    .await?;
    if let StageOutcome::Done(filtered) = filter_outcome {
        if filtered.len() != candidates.len() {
            info!("✓ 최적화 완료: {}개 → {}개", candidates.len(), filtered.len());
        }
        candidates = filtered;
    }
    ctx.node_count = Some(candidates.len());
    let candidate_names: Vec<String> = candidates.iter().map(|h| h.name.clone()).collect();

    // Stage 3: schema fetch around the surviving candidates.
    info!("🗺️  [4] 스키마 조회 중...");
    let use_deep = request.use_deep_search;
    let schema_outcome = run_stage(&llm, "스키마 조회", &ctx, |params| {
        let graph = &state.graph;
        let names = candidate_names.clone();
        let brain = brain_id.clone();
        let mut deep = use_deep;
        if let Some(p) = params {
            if let Some(v) = p.get("use_deep_search").and_then(|v| v.as_bool()) {
                deep = v;
            }
        }
        async move { Ok::<_, AppError>(graph.query_schema_by_names(&brain, &names, deep).await?) }
    })
    .await?;
    let mut schema = match schema_outcome {
        StageOutcome::Done(schema) => schema,
        StageOutcome::Skipped | StageOutcome::Fallback => {
            info!("🔄 대체 방법 사용 (일반 지식으로 답변)");
            return fallback_answer(state, &llm, &question, request.session_id).await;
        }
    };
    if schema.is_empty() {
        info!("⚠️  [5] 스키마 조회 결과 없음 → 일반 지식으로 답변 생성");
        return fallback_answer(state, &llm, &question, request.session_id).await;
    }
    ctx.schema_node_count = Some(schema.start_nodes.len());
    info!(
        "✓ 스키마 조회 완료: 노드 {}개, 관계 {}개",
        schema.start_nodes.len(),
        schema.relationships.len()
    );

    // Stage 4: judge whether the schema suffices; escalate to deep search
    // at most once.
    let summary = format!(
        "노드 {}개, 관련 노드 {}개, 관계 {}개",
        schema.start_nodes.len(),
        schema.related_nodes.len(),
        schema.relationships.len()
    );
    info!("🤖 [5] AI Agent: 스키마 충분성 판단 중... ({summary})");
    let sufficiency = match run_stage(&llm, "스키마 충분성 판단", &ctx, |_| {
        let llm = llm.clone();
        let question = question.clone();
        let summary = summary.clone();
        async move {
            let reply = llm
                .chat(&prompts::schema_sufficiency_prompt(&question, &summary))
                .await?;
            Ok::<SufficiencyResponse, AppError>(parse_stage_reply(&reply))
        }
    })
    .await?
    {
        StageOutcome::Done(s) => s,
        _ => SufficiencyResponse::default(),
    };
    if !sufficiency.is_sufficient && sufficiency.needs_deep_search && !use_deep {
        info!("🔍 정보 부족 감지 → 깊은 탐색 실행...");
        let deep_schema = state
            .graph
            .query_schema_by_names(&brain_id, &candidate_names, true)
            .await?;
        if !deep_schema.is_empty() {
            info!(
                "✓ 깊은 탐색 완료: 노드 {}개 → {}개",
                schema.start_nodes.len() + schema.related_nodes.len(),
                deep_schema.start_nodes.len() + deep_schema.related_nodes.len()
            );
            schema = deep_schema;
            ctx.schema_node_count = Some(schema.start_nodes.len());
        }
    }

    // Stage 5: two-part schema text.
    info!("📝 [6] 스키마 텍스트 생성 중...");
    let raw_schema_text =
        generate_schema_text(&schema.start_nodes, &schema.related_nodes, &schema.relationships);

    // Stage 6: optimization; a broken or too-short result keeps the original.
    info!("🤖 [7] AI Agent: 스키마 텍스트 최적화 중...");
    let mut schema_text = raw_schema_text.clone();
    if let StageOutcome::Done(optimized) = run_stage(&llm, "스키마 텍스트 최적화", &ctx, |_| {
        let llm = llm.clone();
        let question = question.clone();
        let text = raw_schema_text.clone();
        async move {
            Ok::<_, AppError>(
                llm.chat(&prompts::schema_optimization_prompt(&question, &text))
                    .await?
                    .trim()
                    .to_string(),
            )
        }
    })
    .await?
    {
        schema_text = keep_or_replace(schema_text, optimized);
    }

    // Stage 7: answer generation with the EOF reference contract.
    info!("💡 [8] LLM 답변 생성 중...");
    let answer_outcome = run_stage(&llm, "LLM 답변 생성", &ctx, |params| {
        let llm = llm.clone();
        let question = question.clone();
        let mut text = schema_text.clone();
        if let Some(p) = params {
            if p.get("simplify_schema").and_then(|v| v.as_bool()).unwrap_or(false) {
                text = simplify_schema(&text);
            }
        }
        async move {
            Ok::<_, AppError>(llm.generate_answer(&text, &question).await?.trim().to_string())
        }
    })
    .await?;
    let final_answer = match answer_outcome {
        StageOutcome::Done(answer) => answer,
        _ => {
            info!("🔄 대체 방법 사용 (일반 지식으로 답변)");
            return fallback_answer(state, &llm, &question, request.session_id).await;
        }
    };
    if final_answer.is_empty() || final_answer.contains(INSUFFICIENT_MARKER) {
        info!("⚠️  지식그래프 정보 없음 → 일반 지식으로 재생성");
        return fallback_answer(state, &llm, &question, request.session_id).await;
    }

    // Stage 8: pull the cited node names out of the answer.
    let referenced = llm.extract_referenced_nodes(&final_answer);

    let mut final_text = final_answer;
    if !referenced.is_empty() {
        final_text.push_str(&format!("\n\n{REFERENCED_NODES_HEADER}\n"));
        final_text.push_str(
            &referenced.iter().map(|n| format!("- {n}")).collect::<Vec<_>>().join("\n"),
        );
    }

    // Stage 9: expand citations into {name, source_ids: [{id, title, ...}]}.
    info!("📊 [9] 후처리: 참조 노드 추출 및 정확도 계산 중...");
    let enriched = expand_citations(state, &brain_id, &referenced).await?;

    // Stage 10: score the answer against retrieval and schema.
    let accuracy = compute_accuracy(
        &final_text,
        &referenced,
        &brain_id,
        quality,
        &raw_schema_text,
        &state.graph,
        &state.embedder,
    )
    .await?;

    // Stage 11: persist the AI turn.
    let chat_id = state
        .metadata
        .save_chat(request.session_id, true, &final_text, &enriched, accuracy)
        .await?;
    info!("✅ [10] 완료 | 답변 생성 완료 (정확도: {accuracy:.2})");

    Ok(AnswerResponse {
        answer: final_text,
        referenced_nodes: enriched,
        chat_id,
        accuracy,
    })
}

/// Fallback path A: answer from general knowledge, cite nothing, accuracy 0.
async fn fallback_answer(
    state: &AppState,
    llm: &Arc<dyn LlmService>,
    question: &str,
    session_id: i64,
) -> Result<AnswerResponse, AppError> {
    let answer = llm
        .chat(&prompts::general_knowledge_prompt(question))
        .await?
        .trim()
        .to_string();
    let chat_id = state
        .metadata
        .save_chat(session_id, true, &answer, &[], 0.0)
        .await?;
    info!("✅ 완료 | 일반 지식 답변 생성 완료");

    Ok(AnswerResponse {
        answer,
        referenced_nodes: Vec::new(),
        chat_id,
        accuracy: 0.0,
    })
}

/// Join cited nodes to their sources: descriptions give the source ids,
/// the metadata store resolves titles, and each (node, source) pair gets
/// its original sentences.
async fn expand_citations(
    state: &AppState,
    brain_id: &str,
    referenced: &[String],
) -> Result<Vec<ReferencedNode>, AppError> {
    if referenced.is_empty() {
        return Ok(Vec::new());
    }
    let node_to_ids = state.graph.get_descriptions_bulk(referenced, brain_id).await?;

    let mut all_ids: Vec<i64> = node_to_ids.values().flatten().copied().collect();
    all_ids.sort_unstable();
    all_ids.dedup();
    let id_to_title = state.metadata.get_titles_by_ids(&all_ids).await?;

    let mut enriched = Vec::new();
    for node in referenced {
        let mut unique_ids: Vec<i64> = Vec::new();
        for id in node_to_ids.get(node).map(Vec::as_slice).unwrap_or(&[]) {
            if !unique_ids.contains(id) {
                unique_ids.push(*id);
            }
        }

        let mut sources = Vec::new();
        for source_id in unique_ids {
            let Some(title) = id_to_title.get(&source_id) else {
                continue;
            };
            let sentences = state
                .graph
                .get_original_sentences(node, &source_id.to_string(), brain_id)
                .await?;
            sources.push(SourceRef {
                id: source_id.to_string(),
                title: title.clone(),
                original_sentences: sentences,
            });
        }
        enriched.push(ReferencedNode {
            name: node.clone(),
            source_ids: sources,
        });
    }
    Ok(enriched)
}

/// Keep only candidates whose names survived the filter; an empty filter
/// result keeps everything.
fn apply_filter(hits: Vec<SearchHit>, filtered_names: &[String]) -> Vec<SearchHit> {
    if filtered_names.is_empty() {
        return hits;
    }
    let filtered: Vec<SearchHit> = hits
        .iter()
        .filter(|h| filtered_names.contains(&h.name))
        .cloned()
        .collect();
    if filtered.is_empty() {
        hits
    } else {
        filtered
    }
}

/// Accept the optimized schema text only when it looks usable.
fn keep_or_replace(original: String, optimized: String) -> String {
    if optimized.is_empty() || optimized.chars().count() < MIN_OPTIMIZED_SCHEMA_CHARS {
        original
    } else {
        optimized
    }
}

/// Truncate the schema text for a simplified retry.
fn simplify_schema(text: &str) -> String {
    if text.chars().count() <= SIMPLIFIED_SCHEMA_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SIMPLIFIED_SCHEMA_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, score: f32) -> SearchHit {
        SearchHit {
            name: name.to_string(),
            description: String::new(),
            source_id: "1".to_string(),
            score,
        }
    }

    #[test]
    fn filter_keeps_named_candidates() {
        let hits = vec![hit("Alice", 0.9), hit("Bob", 0.4)];
        let out = apply_filter(hits, &["Alice".to_string()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Alice");
    }

    #[test]
    fn empty_filter_result_keeps_originals() {
        let hits = vec![hit("Alice", 0.9), hit("Bob", 0.4)];
        assert_eq!(apply_filter(hits.clone(), &[]).len(), 2);
        assert_eq!(apply_filter(hits, &["Ghost".to_string()]).len(), 2);
    }

    #[test]
    fn short_optimizations_are_rejected()  {
        let original = "Alice -> works at -> Acme".to_string();
        assert_eq!(keep_or_replace(original.clone(), "ok".into()), original);
        assert_eq!(keep_or_replace(original.clone(), String::new()), original);
        let good = "Alice -> works at -> Acme\n\nAlice: engineer".to_string();
        assert_eq!(keep_or_replace(original, good.clone()), good);
    }

    #[test]
    fn simplify_truncates_on_char_boundary() {
        let text = "가".repeat(SIMPLIFIED_SCHEMA_CHARS + 50);
        let simplified = simplify_schema(&text);
        assert!(simplified.ends_with("..."));
        assert_eq!(
            simplified.chars().count(),
            SIMPLIFIED_SCHEMA_CHARS + 3
        );
        let short = "short text";
        assert_eq!(simplify_schema(short), short);
    }
}
