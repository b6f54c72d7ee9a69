//! Markup for data that reaches residue without its original text.

use quick_xml::escape::escape;

use lxm_types::MultiText;

fn forms(text: &MultiText) -> String {
    text.iter()
        .map(|(ws, value)| {
            format!(
                "<form lang=\"{}\"><text>{}</text></form>",
                escape(ws),
                escape(value)
            )
        })
        .collect()
}

pub fn trait_fragment(name: &str, value: &str) -> String {
    format!("<trait name=\"{}\" value=\"{}\"/>", escape(name), escape(value))
}

pub fn relation_fragment(relation_type: &str, target: &str, order: Option<i32>) -> String {
    relation_with_traits(relation_type, target, order, &[])
}

/// A relation element with already rendered trait children.
pub fn relation_with_traits(
    relation_type: &str,
    target: &str,
    order: Option<i32>,
    traits: &[String],
) -> String {
    let mut out = format!(
        "<relation type=\"{}\" ref=\"{}\"",
        escape(relation_type),
        escape(target)
    );
    if let Some(order) = order {
        out.push_str(&format!(" order=\"{order}\""));
    }
    if traits.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&traits.concat());
        out.push_str("</relation>");
    }
    out
}

pub fn field_fragment(tag: &str, text: &MultiText) -> String {
    format!("<field type=\"{}\">{}</field>", escape(tag), forms(text))
}

pub fn note_fragment(kind: &str, text: &MultiText) -> String {
    format!("<note type=\"{}\">{}</note>", escape(kind), forms(text))
}

pub fn variant_fragment(target: Option<&str>, form: &MultiText) -> String {
    match target {
        Some(target) => format!("<variant ref=\"{}\">{}</variant>", escape(target), forms(form)),
        None => format!("<variant>{}</variant>", forms(form)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fragments;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            trait_fragment("note", "a<b & \"c\""),
            "<trait name=\"note\" value=\"a&lt;b &amp; &quot;c&quot;\"/>"
        );
    }

    #[test]
    fn rendered_fragments_are_well_formed() {
        let text = MultiText::from_pairs([("en", "x & y"), ("seh", "<z>")]);
        let stored = format!(
            "<lift-residue>{}{}{}</lift-residue>",
            field_fragment("x-old", &text),
            note_fragment("odd", &text),
            relation_fragment("Synonyms", "kaya_1", Some(2)),
        );
        assert_eq!(fragments(&stored).unwrap().len(), 3);
    }

    #[test]
    fn relation_keeps_trait_children() {
        let traits = vec![trait_fragment("x-certainty", "low")];
        let rendered = relation_with_traits("Antonym", "cold_1", None, &traits);
        assert_eq!(
            rendered,
            concat!(
                "<relation type=\"Antonym\" ref=\"cold_1\">",
                "<trait name=\"x-certainty\" value=\"low\"/></relation>"
            )
        );
        assert_eq!(
            relation_with_traits("Antonym", "cold_1", Some(1), &[]),
            relation_fragment("Antonym", "cold_1", Some(1))
        );
    }
}
