//! Fill in values 3.0 delivery engines expect to be explicit.

use crate::common::xml::{NodeId, XmlDocument};
use crate::qti::chain::name_like;
use crate::qti::constants::MATCH_CORRECT_TEMPLATE;

const DECLARATIONS: [&str; 3] = [
    "qti-response-declaration",
    "qti-outcome-declaration",
    "qti-template-declaration",
];

pub(super) fn default_min_choices(doc: &mut XmlDocument) -> usize {
    let mut changed = 0;
    for id in doc.find_all_local(&["qti-choice-interaction"]) {
        if doc.attr(id, "min-choices").is_none_or(|v| v.trim().is_empty()) {
            doc.set_attr(id, "min-choices", "1");
            changed += 1;
        }
    }
    changed
}

fn uses_match_correct(template: &str) -> bool {
    template.to_ascii_lowercase().contains("match_correct")
}

pub(super) fn default_scoring(doc: &mut XmlDocument) -> usize {
    let Some(item) = doc.find_first_local(&["qti-assessment-item"]) else {
        return 0;
    };
    let mut changed = 0;

    let processing = doc
        .element_children(item)
        .into_iter()
        .find(|&c| doc.local_name(c) == "qti-response-processing");
    let scored = match processing {
        Some(rp) => doc.attr(rp, "template").is_some_and(uses_match_correct),
        None => {
            let has_correct = doc
                .find_all_local(&["qti-correct-response"])
                .into_iter()
                .any(|c| doc.parent(c).is_some_and(|p| doc.local_name(p) == "qti-response-declaration"));
            if !has_correct {
                return 0;
            }
            let rp = doc.create_element_with(
                name_like(doc, item, "qti-response-processing"),
                &[("template", MATCH_CORRECT_TEMPLATE)],
            );
            match first_child(doc, item, "qti-modal-feedback") {
                Some(feedback) => doc.insert_before(feedback, rp),
                None => doc.append_child(item, rp),
            }
            changed += 1;
            true
        },
    };

    if scored && !declares_outcome(doc, item, "SCORE") {
        let outcome = doc.create_element_with(
            name_like(doc, item, "qti-outcome-declaration"),
            &[("identifier", "SCORE"), ("cardinality", "single"), ("base-type", "float")],
        );
        let last_declaration = doc
            .element_children(item)
            .into_iter()
            .filter(|&c| DECLARATIONS.contains(&doc.local_name(c)))
            .last();
        match last_declaration {
            Some(anchor) => doc.insert_after(anchor, outcome),
            None => match doc.element_children(item).first() {
                Some(&first) => doc.insert_before(first, outcome),
                None => doc.append_child(item, outcome),
            },
        }
        changed += 1;
    }
    changed
}

fn first_child(doc: &XmlDocument, parent: NodeId, local: &str) -> Option<NodeId> {
    doc.element_children(parent)
        .into_iter()
        .find(|&c| doc.local_name(c) == local)
}

fn declares_outcome(doc: &XmlDocument, item: NodeId, identifier: &str) -> bool {
    doc.element_children(item)
        .into_iter()
        .any(|c| doc.local_name(c) == "qti-outcome-declaration" && doc.attr(c, "identifier") == Some(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_choices() {
        let mut doc = XmlDocument::parse(
            r#"<div><qti-choice-interaction min-choices=""/><qti-choice-interaction min-choices="0"/></div>"#,
        )
        .unwrap();
        assert_eq!(default_min_choices(&mut doc), 1);
        let values: Vec<_> = doc
            .find_all_local(&["qti-choice-interaction"])
            .into_iter()
            .map(|id| doc.attr(id, "min-choices").unwrap().to_string())
            .collect();
        assert_eq!(values, ["1", "0"]);
    }

    #[test]
    fn test_scoring_placement() {
        let mut doc = XmlDocument::parse(
            r#"<qti-assessment-item identifier="I">
                <qti-response-declaration identifier="RESPONSE"><qti-correct-response><qti-value>A</qti-value></qti-correct-response></qti-response-declaration>
                <qti-outcome-declaration identifier="FEEDBACK"/>
                <qti-item-body/>
                <qti-modal-feedback identifier="F"/>
            </qti-assessment-item>"#,
        )
        .unwrap();
        assert_eq!(default_scoring(&mut doc), 2);
        let item = doc.root_element().unwrap();
        let order: Vec<String> = doc
            .element_children(item)
            .into_iter()
            .map(|c| format!("{}{}", doc.local_name(c), doc.attr(c, "identifier").map(|i| format!("#{}", i)).unwrap_or_default()))
            .collect();
        assert_eq!(
            order,
            [
                "qti-response-declaration#RESPONSE",
                "qti-outcome-declaration#FEEDBACK",
                "qti-outcome-declaration#SCORE",
                "qti-item-body",
                "qti-response-processing",
                "qti-modal-feedback#F",
            ]
        );
        assert_eq!(default_scoring(&mut doc), 0);
    }

    #[test]
    fn test_custom_processing_untouched() {
        let mut doc = XmlDocument::parse(
            r#"<qti-assessment-item><qti-response-declaration identifier="R"><qti-correct-response/></qti-response-declaration><qti-response-processing><qti-set-outcome-value identifier="X"/></qti-response-processing></qti-assessment-item>"#,
        )
        .unwrap();
        assert_eq!(default_scoring(&mut doc), 0);
    }

    #[test]
    fn test_no_correct_response_no_template() {
        let mut doc = XmlDocument::parse(
            r#"<qti-assessment-item><qti-response-declaration identifier="R"/><qti-item-body/></qti-assessment-item>"#,
        )
        .unwrap();
        assert_eq!(default_scoring(&mut doc), 0);
        assert!(doc.find_first_local(&["qti-response-processing"]).is_none());
    }
}
