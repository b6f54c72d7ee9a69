use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ResidueError, ResidueResult};

/// Opening tag of a stored residue document.
pub const RESIDUE_OPEN: &str = "<lift-residue>";
/// Closing tag of a stored residue document.
pub const RESIDUE_CLOSE: &str = "</lift-residue>";

const RESIDUE_ELEMENT: &[u8] = b"lift-residue";

/// Split a stored residue document into its top-level fragments.
///
/// Fragments are returned as the exact source text, so entity references and
/// attribute quoting survive unchanged. Whitespace between fragments is
/// dropped.
pub fn fragments(residue: &str) -> ResidueResult<Vec<String>> {
    let residue = residue.trim();
    if residue.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_str(residue);
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| ResidueError::Malformed(e.to_string()))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                if depth == 0 && e.name().as_ref() != RESIDUE_ELEMENT {
                    return Err(ResidueError::Malformed(format!(
                        "unexpected root element at byte {before}"
                    )));
                }
                depth += 1;
                if depth == 2 {
                    start = before;
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    out.push(residue[start..after].to_string());
                }
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ResidueError::Malformed("unbalanced end tag".into()))?;
            }
            Event::Empty(e) => match depth {
                0 if e.name().as_ref() == RESIDUE_ELEMENT => {}
                0 => {
                    return Err(ResidueError::Malformed(
                        "fragment outside residue element".into(),
                    ))
                }
                1 => out.push(residue[before..after].to_string()),
                _ => {}
            },
            Event::Text(t) => {
                if depth == 1 && !t.iter().all(u8::is_ascii_whitespace) {
                    out.push(residue[before..after].trim().to_string());
                }
            }
            Event::CData(_) | Event::Comment(_) if depth == 1 => {
                out.push(residue[before..after].to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ResidueError::Malformed("unclosed residue element".into()));
    }
    Ok(out)
}
