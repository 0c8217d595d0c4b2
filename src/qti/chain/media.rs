//! Media markup: `object` to native players, and the interaction upgrade
//! that depends on it.

use crate::common::xml::XmlDocument;
use crate::package::packpath::basename;
use crate::qti::chain::name_like;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    fn from_mime(mime: &str) -> Option<Self> {
        let major = mime.split('/').next()?.trim().to_ascii_lowercase();
        match major.as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

pub(super) fn convert_media_objects(doc: &mut XmlDocument) -> usize {
    let mut changed = 0;
    for id in doc.find_all_local(&["object"]) {
        let (Some(data), Some(mime)) = (doc.attr(id, "data"), doc.attr(id, "type")) else {
            continue;
        };
        let Some(kind) = MediaKind::from_mime(mime) else {
            continue;
        };
        let data = data.to_string();
        let mime = mime.to_string();
        let width = doc.attr(id, "width").map(str::to_string);
        let height = doc.attr(id, "height").map(str::to_string);

        let replacement = match kind {
            MediaKind::Image => {
                let fallback = doc.text_content(id);
                let alt = match fallback.trim() {
                    "" => basename(&data).to_string(),
                    text => text.to_string(),
                };
                doc.create_element_with(name_like(doc, id, "img"), &[("src", data.as_str()), ("alt", alt.as_str())])
            },
            MediaKind::Video | MediaKind::Audio => {
                let local = if kind == MediaKind::Video { "video" } else { "audio" };
                let player = doc.create_element_with(name_like(doc, id, local), &[("controls", "controls")]);
                let source = doc.create_element_with(name_like(doc, id, "source"), &[("src", data.as_str()), ("type", mime.as_str())]);
                doc.append_child(player, source);
                player
            },
        };
        if let Some(width) = width {
            doc.set_attr(replacement, "width", width);
        }
        if let Some(height) = height {
            doc.set_attr(replacement, "height", height);
        }
        doc.replace(id, replacement);
        changed += 1;
    }
    changed
}

pub(super) fn upgrade_legacy_interactions(doc: &mut XmlDocument) -> usize {
    let mut changed = 0;
    for id in doc.find_all_local(&["qti-custom-interaction"]) {
        let players = doc
            .descendants(id)
            .into_iter()
            .filter(|&d| matches!(doc.local_name(d), "video" | "audio"))
            .count();
        if players != 1 {
            continue;
        }

        let response = doc.attr(id, "response-identifier").unwrap_or_default().to_string();
        let name = name_like(doc, id, "qti-media-interaction");
        let kept: Vec<(String, String)> = doc
            .attrs(id)
            .iter()
            .filter(|a| a.is_namespace_decl() || matches!(a.name.as_str(), "id" | "class"))
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect();

        let upgraded = doc.create_element_with(
            name,
            &[
                ("response-identifier", response.as_str()),
                ("autostart", "false"),
                ("min-plays", "0"),
                ("max-plays", "0"),
            ],
        );
        for (key, value) in kept {
            doc.set_attr(upgraded, &key, value);
        }
        for child in doc.children(id).to_vec() {
            doc.append_child(upgraded, child);
        }
        doc.replace(id, upgraded);
        changed += 1;
    }
    changed
}
