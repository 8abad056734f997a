//! The text network-spec format: `NAME : in_labels ; out_labels`, one
//! tensor per line, with a distinguished `TOUT` entry naming the overall
//! network's output label order.
//!
//! Hand-rolled line-oriented parsing, in the spirit of the teacher's own
//! preference for small focused modules over pulling in a parser-combinator
//! crate for a grammar this simple (none of the retrieved teacher sources
//! reach for one either).

use symtensor_core::SymTensorError;

/// One line of a network spec: the labels a named tensor's bonds must
/// carry, split into `In`-bond labels and `Out`-bond labels by the line's
/// `;` separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub in_labels: Vec<i32>,
    pub out_labels: Vec<i32>,
}

/// A parsed network spec file: one [`TensorSpec`] per named tensor, plus
/// the `TOUT` entry's row/column label split for the network's final
/// output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub tensors: Vec<TensorSpec>,
    pub out_in_labels: Vec<i32>,
    pub out_out_labels: Vec<i32>,
}

/// Parses a complete network-spec document.
///
/// Grammar, one non-blank, non-comment line per entry:
/// ```text
/// NAME : in_label in_label ... ; out_label out_label ...
/// ```
/// Exactly one line must be named `TOUT`; its two label lists become
/// [`NetworkSpec::out_in_labels`] and [`NetworkSpec::out_out_labels`] (the
/// row/col split `launch()` permutes the final result into) and it is not
/// treated as a tensor. Lines starting with `#` are comments.
pub fn parse(source: &str) -> Result<NetworkSpec, SymTensorError> {
    let mut tensors = Vec::new();
    let mut out_split = None;

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name_part, label_part) = line.split_once(':').ok_or_else(|| {
            SymTensorError::InvalidNetwork(format!("line {}: expected 'NAME : in ; out'", lineno + 1))
        })?;
        let name = name_part.trim().to_string();
        let (in_part, out_part) = match label_part.split_once(';') {
            Some((a, b)) => (a, b),
            None => (label_part, ""),
        };
        let in_labels = parse_labels(in_part, lineno)?;
        let out_labels_line = parse_labels(out_part, lineno)?;

        if name == "TOUT" {
            out_split = Some((in_labels, out_labels_line));
        } else {
            tensors.push(TensorSpec { name, in_labels, out_labels: out_labels_line });
        }
    }

    let (out_in_labels, out_out_labels) = out_split
        .ok_or_else(|| SymTensorError::InvalidNetwork("network spec is missing a TOUT entry".into()))?;
    Ok(NetworkSpec { tensors, out_in_labels, out_out_labels })
}

fn parse_labels(part: &str, lineno: usize) -> Result<Vec<i32>, SymTensorError> {
    part.split_whitespace()
        .map(|tok| {
            tok.parse::<i32>()
                .map_err(|_| SymTensorError::InvalidNetwork(format!("line {}: bad label '{tok}'", lineno + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tensors_and_tout() {
        let spec = parse(
            "# a ring network\n\
             A : 1 2 ; 3\n\
             B : 3 4 ; 5\n\
             TOUT : 1 2 ; 4 5\n",
        )
        .unwrap();
        assert_eq!(spec.tensors.len(), 2);
        assert_eq!(spec.tensors[0].name, "A");
        assert_eq!(spec.tensors[0].in_labels, vec![1, 2]);
        assert_eq!(spec.tensors[0].out_labels, vec![3]);
        assert_eq!(spec.out_in_labels, vec![1, 2]);
        assert_eq!(spec.out_out_labels, vec![4, 5]);
    }

    #[test]
    fn missing_tout_is_an_error() {
        let err = parse("A : 1 ; 2\n").unwrap_err();
        assert!(matches!(err, SymTensorError::InvalidNetwork(_)));
    }

    #[test]
    fn malformed_line_is_an_error() {
        let err = parse("A 1 2\n").unwrap_err();
        assert!(matches!(err, SymTensorError::InvalidNetwork(_)));
    }
}
