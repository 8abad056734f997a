//! Diagnostic text output: the five-line `profile()` summary and the
//! human-readable `print_diagram`/`print_raw_elem` dumps. Format stability
//! is not guaranteed across versions, matching the specification's own
//! disclaimer for these entry points.

use symtensor_core::Qnum;
use symtensor_tensor::{profile as counters, SymTensor};

/// Renders the process-wide tensor/element counters as the five-line
/// summary the specification's `profile()` produces.
pub fn profile() -> String {
    let snap = counters::snapshot();
    format!(
        "symtensor profile\n\
         tensors created: {}\n\
         elements live:   {}\n\
         peak elements:   {}\n\
         peak per tensor: {}\n",
        snap.tensors_created, snap.elem_num, snap.max_elem_num, snap.max_elem_ten
    )
}

/// A compact structural summary: name, bond directions/dims, labels,
/// number of nonzero charge blocks.
pub fn print_diagram<Q: Qnum>(tensor: &SymTensor<Q>) -> String {
    let mut out = format!("SymTensor \"{}\" [{} bonds, {} blocks]\n", tensor.name(), tensor.bonds().len(), tensor.blocks().len());
    for (i, (bond, &label)) in tensor.bonds().iter().zip(tensor.labels()).enumerate() {
        out.push_str(&format!(
            "  bond {i}: label={label} dir={:?} dim={} states={}\n",
            bond.direction(),
            bond.dim(),
            bond.num_states()
        ));
    }
    out
}

/// Dumps the tensor's full dense raw element array, one row per line, for
/// a two-bond (matrix-shaped) tensor; higher-rank tensors print as a
/// single flat row since there is no canonical multi-dimensional text
/// layout for them.
pub fn print_raw_elem<Q: Qnum>(tensor: &SymTensor<Q>) -> String {
    let elems = tensor.get_raw_elem();
    if tensor.bonds().len() == 2 {
        let cols = tensor.bonds()[1].dim().max(1);
        let mut out = String::new();
        for row in elems.chunks(cols) {
            let line: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    } else {
        let line: Vec<String> = elems.iter().map(|v| format!("{:.6}", v)).collect();
        format!("{}\n", line.join(" "))
    }
}
