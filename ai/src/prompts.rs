//! Prompt builders shared by both backends.
//!
//! The prompts keep the service's native Korean wording; the answer prompt
//! carries the EOF sentinel contract that reference extraction depends on.

/// Marker the model must print when the schema cannot answer the question.
pub const INSUFFICIENT_MARKER: &str = "지식그래프에 해당 정보가 없습니다";

/// Header appended to answers before the cited-node list.
pub const REFERENCED_NODES_HEADER: &str = "[참고된 노드 목록]";

pub const EXTRACTION_SYSTEM: &str =
    "너는 텍스트에서 구조화된 노드와 엣지를 추출하는 전문가야. \
     엣지의 source와 target은 반드시 노드의 name을 참조해야 해.";

/// Node/edge extraction over one chunk of text.
pub fn extraction_prompt(chunk: &str) -> String {
    format!(
        "다음 텍스트를 분석해서 노드와 엣지 정보를 추출해줘. \
         노드는 {{ \"label\": string, \"name\": string, \"description\": string }} 형식의 객체 배열, \
         엣지는 {{ \"source\": string, \"target\": string, \"relation\": string }} 형식의 객체 배열로 출력해줘. \
         여기서 source와 target은 노드의 name을 참조해야 하고, source_id는 사용하면 안 돼. \
         출력 결과는 반드시 아래 JSON 형식을 준수해야 해:\n\
         {{\n  \"nodes\": [ ... ],\n  \"edges\": [ ... ]\n}}\n\
         문장에 있는 모든 개념을 노드로 만들어줘. \
         각 노드의 description은 해당 노드를 간단히 설명하는 문장이어야 해. \
         만약 하나의 긴 description에 여러 개념이 섞여 있다면, 반드시 개념 단위로 나누어 여러 노드를 생성해줘. \
         노드와 엣지 정보가 추출되지 않으면 빈 배열을 출력해줘. \
         json 형식 외에는 출력 금지.\n\n텍스트: {chunk}"
    )
}

/// Final answer over the schema text, with the EOF reference sentinel.
pub fn answer_prompt(schema_text: &str, question: &str) -> String {
    format!(
        "다음 지식그래프 컨텍스트와 질문을 바탕으로, 컨텍스트에 명시된 정보나 연결된 관계를 통해 \
         추론 가능한 범위 내에서만 자연어로 답변해줘. \
         정보가 일부라도 있다면 해당 범위 내에서 최대한 설명하고, 컨텍스트와 완전히 무관한 경우에만 \
         '{INSUFFICIENT_MARKER}.'라고 출력해. \
         지식그래프 컨텍스트 형식:\n\
         1. [관계 목록] start_name -> relation_label -> end_name (모든 노드가 관계를 가지고 있는 것은 아님)\n\
         2. [노드 목록] {{node_name}}: {{desc_str}}\n\
         지식그래프 컨텍스트:\n{schema_text}\n\n\
         질문: {question}\n\n\
         출력 형식:\n\
         [여기에 질문에 대한 상세 답변 작성 또는 '{INSUFFICIENT_MARKER}.' 출력]\n\n\
         EOF\n\
         {{\n  \"referenced_nodes\": [\"노드 이름1\", \"노드 이름2\", ...]\n}}\n\
         ※ 'referenced_nodes'에는 참고한 노드 이름만 정확히 JSON 배열로 나열하고, \
         도메인 정보, 노드 간 관계, 설명은 포함하지 마.\n\
         ※ 반드시 EOF를 출력해"
    )
}

/// Fallback path A: answer from general knowledge, cite nothing.
pub fn general_knowledge_prompt(question: &str) -> String {
    format!(
        "다음 질문에 대해 일반적인 지식을 바탕으로 친절하고 상세하게 답변해주세요. \
         업로드된 소스 파일을 참고하지 말고, 당신이 알고 있는 일반적인 지식으로만 답변해주세요.\n\n\
         질문: {question}\n\n답변:"
    )
}

/// Stage 2: relevance filter over the retrieved candidates.
pub fn node_quality_prompt(question: &str, nodes: &[(String, f32)]) -> String {
    let nodes_text = nodes
        .iter()
        .map(|(name, score)| format!("- {name} (유사도: {score:.2})"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "다음은 사용자 질문과 검색된 노드 목록입니다.\n\n\
         사용자 질문: {question}\n\n\
         검색된 노드 목록:\n{nodes_text}\n\n\
         다음 JSON 형식으로 응답해주세요:\n\
         {{\"filtered_node_names\": [\"노드명1\", \"노드명2\", ...], \"needs_more_search\": true/false, \"reason\": \"판단 이유\"}}\n\n\
         판단 기준:\n\
         1. 질문과 직접적으로 관련된 노드만 포함\n\
         2. 관련성이 낮은 노드는 제외\n\
         3. 답변에 필요한 정보가 부족하면 needs_more_search를 true로 설정\n\
         4. JSON 형식으로만 응답하고 다른 설명은 포함하지 마세요."
    )
}

/// Stage 4: is the fetched schema enough to answer?
pub fn schema_sufficiency_prompt(question: &str, schema_summary: &str) -> String {
    format!(
        "다음은 사용자 질문과 스키마 조회 결과 요약입니다.\n\n\
         사용자 질문: {question}\n\n\
         스키마 조회 결과: {schema_summary}\n\n\
         다음 JSON 형식으로 응답해주세요:\n\
         {{\"is_sufficient\": true/false, \"needs_deep_search\": true/false, \"missing_info\": \"부족한 정보\", \"reason\": \"판단 이유\"}}\n\n\
         판단 기준:\n\
         1. 질문에 답변하기에 충분한 정보가 있는지 판단\n\
         2. 부족하면 needs_deep_search를 true로 설정\n\
         3. JSON 형식으로만 응답하고 다른 설명은 포함하지 마세요."
    )
}

/// Stage 6: drop schema lines unrelated to the question.
pub fn schema_optimization_prompt(question: &str, raw_schema_text: &str) -> String {
    format!(
        "다음은 사용자 질문과 스키마 텍스트입니다.\n\n\
         사용자 질문: {question}\n\n\
         스키마 텍스트:\n{raw_schema_text}\n\n\
         질문에 답변하는데 직접적으로 관련된 정보만 남기고 불필요한 정보는 제거하여 \
         최적화된 스키마 텍스트를 생성해주세요.\n\
         원본 스키마의 구조와 형식은 유지하되, 질문과 무관한 노드나 관계는 제외해주세요.\n\
         최적화된 스키마 텍스트만 응답하고 다른 설명은 포함하지 마세요."
    )
}

/// Recovery controller: classify the failure and pick a corrective action.
pub fn recovery_prompt(
    step_name: &str,
    error_type: &str,
    error_message: &str,
    question: &str,
    node_count: Option<usize>,
    schema_node_count: Option<usize>,
) -> String {
    let fmt_count = |c: Option<usize>| c.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into());
    format!(
        "다음은 질문-답변 파이프라인에서 발생한 오류입니다.\n\n\
         오류 발생 단계: {step_name}\n\
         오류 유형: {error_type}\n\
         오류 메시지: {error_message}\n\n\
         현재 컨텍스트:\n\
         - 질문: {question}\n\
         - 검색된 노드 수: {}\n\
         - 스키마 노드 수: {}\n\n\
         다음 JSON 형식으로 응답해주세요:\n\
         {{\"recovery_action\": \"retry|skip|modify|fallback\", \"modification\": {{\"key\": \"value\"}}, \
         \"reason\": \"복구 방안 이유\", \"retry_params\": {{\"param\": \"value\"}}}}\n\n\
         복구 액션 설명:\n\
         - retry: 동일한 파라미터로 재시도\n\
         - skip: 현재 단계 건너뛰고 다음 단계 진행\n\
         - modify: 파라미터 수정 후 재시도 (retry_params에 수정 사항 포함)\n\
         - fallback: 대체 방법 사용 (예: 일반 지식으로 답변)\n\n\
         JSON 형식으로만 응답하고 다른 설명은 포함하지 마세요.",
        fmt_count(node_count),
        fmt_count(schema_node_count),
    )
}
