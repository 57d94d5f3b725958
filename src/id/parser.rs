//! Identifier parsing and registry validation.

use crate::error::ParseError;
use crate::meta::{ArrayDatasetEntry, RegistrySnapshot, SpecimenEntry};

use super::descriptor::{DataDescriptor, IndexRef, Modality, ViewPlane};

/// Parse and validate a composite data identifier against the current
/// registry snapshot.
///
/// Structural decomposition happens first and yields [`ParseError::Malformed`]
/// / [`ParseError::MissingField`]; defaulting (encoding) is applied next;
/// finally every field is validated against the specimen's metadata entry,
/// yielding [`ParseError::UnknownSpecimen`] or
/// [`ParseError::UnsupportedCombination`] with the offending value and the
/// allowed set.
pub fn parse(data_id: &str, snapshot: &RegistrySnapshot) -> Result<DataDescriptor, ParseError> {
    let parts: Vec<&str> = data_id.split(':').collect();
    let [specimen_id, image_type, level_raw, channel_raw, index_raw]: [&str; 5] =
        parts.try_into().map_err(|_| ParseError::Malformed {
            reason: "identifier must have 5 colon-separated fields".into(),
        })?;

    if specimen_id.is_empty() {
        return Err(ParseError::Malformed {
            reason: "empty specimen id".into(),
        });
    }

    let (modality, view, encoding) = parse_image_type(image_type)?;
    let level = parse_numeric(level_raw, "resolution_level")?;
    let channel = parse_numeric(channel_raw, "channel")?;
    let index = parse_index(index_raw, modality)?;

    if modality != Modality::Mesh {
        if level.is_none() {
            return Err(ParseError::MissingField {
                field: "resolution_level",
            });
        }
        if channel.is_none() {
            return Err(ParseError::MissingField { field: "channel" });
        }
    }

    // Defaulting happens before registry validation
    let encoding = encoding.unwrap_or_else(|| modality.default_encoding().to_string());

    let descriptor = DataDescriptor {
        specimen_id: specimen_id.to_string(),
        modality,
        view,
        encoding,
        level,
        channel,
        index,
    };

    let entry = snapshot
        .get(specimen_id)
        .ok_or_else(|| ParseError::UnknownSpecimen {
            specimen_id: specimen_id.to_string(),
        })?;
    validate(&descriptor, entry)?;

    Ok(descriptor)
}

/// Decompose `{modality}{view}[-{encoding}]`.
fn parse_image_type(
    token: &str,
) -> Result<(Modality, ViewPlane, Option<String>), ParseError> {
    let (head, encoding) = match token.split_once('-') {
        Some((head, enc)) => (head, Some(enc)),
        None => (token, None),
    };

    if head.len() < 4 || !head.is_char_boundary(3) {
        return Err(ParseError::Malformed {
            reason: format!("invalid image type '{}'", token),
        });
    }

    let modality = Modality::from_token(&head[..3]).ok_or_else(|| ParseError::Malformed {
        reason: format!("invalid modality in '{}'", token),
    })?;
    let view = ViewPlane::from_token(&head[3..]).ok_or_else(|| ParseError::Malformed {
        reason: format!("invalid view type in '{}'", token),
    })?;

    let encoding = match encoding {
        Some(enc) => {
            if enc.is_empty()
                || !enc.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(ParseError::Malformed {
                    reason: format!("invalid encoding in '{}'", token),
                });
            }
            Some(enc.to_string())
        }
        None => None,
    };

    Ok((modality, view, encoding))
}

/// Parse an optionally-empty non-negative numeric field.
fn parse_numeric(raw: &str, field: &'static str) -> Result<Option<u32>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ParseError::Malformed {
            reason: format!("{} '{}' is not a non-negative integer", field, raw),
        })
}

/// Parse the index field; arity and token types depend on the modality.
fn parse_index(raw: &str, modality: Modality) -> Result<IndexRef, ParseError> {
    match modality {
        Modality::Image | Modality::Mask => {
            let coords: Vec<&str> = raw.split(',').collect();
            let [z, y, x]: [&str; 3] = coords.try_into().map_err(|_| ParseError::Malformed {
                reason: "coords must be z,y,x for image/mask requests".into(),
            })?;
            let parse = |t: &str| {
                t.parse::<i64>().map_err(|_| ParseError::Malformed {
                    reason: "coords values must be integers".into(),
                })
            };
            Ok(IndexRef::Voxel {
                z: parse(z)?,
                y: parse(y)?,
                x: parse(x)?,
            })
        }
        Modality::Mesh => {
            if raw.is_empty() {
                return Err(ParseError::MissingField { field: "index" });
            }
            let mut parts = raw.splitn(2, ',');
            let name = parts.next().unwrap_or_default();
            if name.is_empty() {
                return Err(ParseError::Malformed {
                    reason: "empty region name".into(),
                });
            }
            let plane_z = match parts.next() {
                Some(z) => Some(z.parse::<i64>().map_err(|_| ParseError::Malformed {
                    reason: format!("plane coordinate '{}' is not an integer", z),
                })?),
                None => None,
            };
            Ok(IndexRef::Region {
                name: name.to_string(),
                plane_z,
            })
        }
    }
}

/// Validate a structurally sound descriptor against the specimen's entry.
fn validate(descriptor: &DataDescriptor, entry: &SpecimenEntry) -> Result<(), ParseError> {
    if !entry.has_modality(descriptor.modality) {
        return Err(ParseError::UnsupportedCombination {
            field: "modality",
            value: descriptor.modality.token().to_string(),
            allowed: entry.available_modalities(),
        });
    }

    match descriptor.modality {
        Modality::Image | Modality::Mask => {
            // has_modality above guarantees the dataset exists
            let (_, dataset) = entry.array_dataset(descriptor.modality).unwrap();
            validate_array_request(descriptor, dataset)
        }
        Modality::Mesh => {
            if descriptor.view != ViewPlane::Volumetric {
                return Err(ParseError::UnsupportedCombination {
                    field: "view_type",
                    value: descriptor.view.token().to_string(),
                    allowed: vec![ViewPlane::Volumetric.token().to_string()],
                });
            }
            let (_, dataset) = entry.mesh_dataset().unwrap();
            if !dataset.encoding_list.iter().any(|e| e == &descriptor.encoding) {
                return Err(ParseError::UnsupportedCombination {
                    field: "encoding",
                    value: descriptor.encoding.clone(),
                    allowed: dataset.encoding_list.clone(),
                });
            }
            Ok(())
        }
    }
}

fn validate_array_request(
    descriptor: &DataDescriptor,
    dataset: &ArrayDatasetEntry,
) -> Result<(), ParseError> {
    let view_token = descriptor.view.token();
    if !dataset.view_types.iter().any(|v| v == view_token) {
        return Err(ParseError::UnsupportedCombination {
            field: "view_type",
            value: view_token.to_string(),
            allowed: dataset.view_types.clone(),
        });
    }

    let encodings = if descriptor.view.is_planar() {
        &dataset.encoding_2d_list
    } else {
        &dataset.encoding_3d_list
    };
    if !encodings.iter().any(|e| e == &descriptor.encoding) {
        return Err(ParseError::UnsupportedCombination {
            field: "encoding",
            value: descriptor.encoding.clone(),
            allowed: encodings.clone(),
        });
    }

    // Parser guarantees Some for image/mask
    let level = descriptor.level.unwrap();
    if !dataset.has_level(level) {
        return Err(ParseError::UnsupportedCombination {
            field: "resolution_level",
            value: level.to_string(),
            allowed: dataset.level_numbers(),
        });
    }

    let channel = descriptor.channel.unwrap();
    if channel >= dataset.channel_count {
        return Err(ParseError::UnsupportedCombination {
            field: "channel",
            value: channel.to_string(),
            allowed: (0..dataset.channel_count).map(|c| c.to_string()).collect(),
        });
    }

    Ok(())
}
