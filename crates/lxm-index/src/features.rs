use crate::error::{IndexError, IndexResult};

/// Parse a feature-structure expression such as `[gen:masc num:sg]`.
///
/// Brackets are optional. Each item is `name:value`; an item without a colon
/// or with an empty side is rejected.
pub fn parse_feature_structure(expr: &str) -> IndexResult<Vec<(String, String)>> {
    let trimmed = expr.trim();
    let inner = match (trimmed.strip_prefix('['), trimmed.strip_suffix(']')) {
        (Some(_), Some(_)) if trimmed.len() >= 2 => &trimmed[1..trimmed.len() - 1],
        (None, None) => trimmed,
        _ => return Err(IndexError::InvalidFeatureStructure(expr.to_string())),
    };
    if inner.contains('[') || inner.contains(']') {
        return Err(IndexError::InvalidFeatureStructure(expr.to_string()));
    }

    let mut pairs = Vec::new();
    for item in inner.split_whitespace() {
        let (name, value) = item
            .split_once(':')
            .ok_or_else(|| IndexError::InvalidFeatureStructure(expr.to_string()))?;
        if name.is_empty() || value.is_empty() {
            return Err(IndexError::InvalidFeatureStructure(expr.to_string()));
        }
        pairs.push((name.to_string(), value.to_string()));
    }
    if pairs.is_empty() {
        return Err(IndexError::InvalidFeatureStructure(expr.to_string()));
    }
    Ok(pairs)
}
