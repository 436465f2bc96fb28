// src/oracle/prompt.rs
//! Request text for the selection oracle.

use serde::Serialize;

use crate::ingest::types::Candidate;

pub const SYSTEM_PROMPT: &str = r#"你是一名做竞品分析的工具类产品经理，只推荐给最终用户开箱即用的效率工具。

# 接受
- 文档与知识管理：笔记、PDF、知识库、思维导图
- 办公效能：会议、PPT、表格、项目管理、邮件
- 创意设计：图片、视频、UI 设计、文案写作
- 自动化：工作流、批量处理、数据整理

# 拒绝（推荐语返回 NULL）
- 开发者工具：IDE、SDK、API、部署、DevOps、Agent Builder
- 虚拟伴侣、角色扮演
- 垂直行业：交易、医疗、法律、房地产
- 基础模型与云厂商
- 没有任何用户量、融资、媒体报道或榜单信号的落地页

# 产地（默认 Global）
只有搜索结果明确出现 ICP 备案号，或公司总部明确位于北京、上海、深圳、杭州、广州时，才标 CN。
名字像中文、华人团队、面向亚洲市场都不算证据。

# 推荐语
简体中文，英文只允许出现产品名；60-80 字；按“痛点 → 方案 → 价值”写，点出核心价值，不要罗列功能。

# 输出
只输出 JSON，不要解释。"#;

pub const SUMMARY_SYSTEM_PROMPT: &str = "你是中文科技编辑。只输出推荐语本身，不要解释。";

/// Fallback label when a candidate has no text at all.
pub const DEFAULT_BLURB: &str = "用于办公或内容创作的实用工具。";

#[derive(Serialize)]
struct BatchItem<'a> {
    name: &'a str,
    url: &'a str,
    tagline: &'a str,
    description: String,
    source: &'a str,
}

/// JSON-encoded candidate batch as embedded in user prompts.
pub fn encode_batch(candidates: &[Candidate]) -> String {
    let items: Vec<BatchItem<'_>> = candidates
        .iter()
        .map(|c| BatchItem {
            name: &c.name,
            url: &c.url,
            tagline: &c.tagline,
            description: c.enriched_description(),
            source: c.source.label(),
        })
        .collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}

pub fn select_best_prompt(candidates: &[Candidate], source_label: &str, extra: &str) -> String {
    let mut p = format!(
        "请用中文回答。\n\n以下是 {} 个产品，来源：{}。\n请选择一个最实用的，写一段中文推荐语。\n\n产品列表：\n{}\n\n\
要求：\n1. 推荐语必须是中文（60-80字）\n2. 结构：用户痛点 → 工具方案 → 核心价值\n3. 禁止输出英文句子\n\n\
输出格式（JSON）：\n{{\"name\": \"产品名\", \"url\": \"链接\", \"one_sentence_intro_cn\": \"中文推荐语\"}}",
        candidates.len(),
        source_label,
        encode_batch(candidates),
    );
    if !extra.is_empty() {
        p.push_str("\n\n");
        p.push_str(extra);
    }
    p
}

/// Extra instruction naming products the oracle must not pick; empty when
/// there is nothing to exclude.
pub fn exclusion_note(names: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    format!("以下产品近期已推荐过，请不要选择：{}", names.join("、"))
}

pub fn select_top_n_prompt(candidates: &[Candidate], min: usize, max: usize) -> String {
    format!(
        "请用中文回答。\n\n以下是 {} 个产品，请选择 {}-{} 个给最终用户用的效率工具。\n\n产品列表：\n{}\n\n\
不合格的产品把 one_sentence_intro_cn 设为 NULL。\n\
origin 只能是 CN 或 Global，没有明确证据一律 Global。\n\n\
输出格式（JSON 数组）：\n\
[{{\"name\": \"产品名\", \"url\": \"链接\", \"one_sentence_intro_cn\": \"推荐语\", \"origin\": \"CN或Global\", \"source\": \"来源\"}}]",
        candidates.len(),
        min,
        max,
        encode_batch(candidates),
    )
}

pub fn summary_prompt(name: &str, text: &str) -> String {
    format!(
        "产品：{name}\n英文：{text}\n\n请用中文写一段推荐语（60-80字），结构：痛点 → 方案 → 价值。\n只输出推荐语本身，不要输出解释或注释。"
    )
}
