//! The binary `SymTensor` save/load format: magic, status/scalar-kind
//! bytes, bond/state lists, labels, name, then blocks in ascending `Qnum`
//! order.
//!
//! Hand-rolled byte-level reader/writer, not `serde`+`bincode`: the layout
//! below is externally specified byte-for-byte (magic, bitfields,
//! variable-length state lists, block payloads), so a derived `serde`
//! encoding would drift from it the moment either side's struct shape
//! changed. `BTreeMap`'s iteration order already gives ascending-`Qnum`
//! block order for free.

use num_complex::Complex64;
use symtensor_core::Qnum;
use symtensor_tensor::{status, Block, Bond, Direction, ScalarKind, SymTensor};
use thiserror::Error;

const MAGIC: &[u8; 4] = b"UT10";

#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("bad magic bytes: expected \"UT10\"")]
    BadMagic,
    #[error("unexpected end of input while reading {0}")]
    Truncated(&'static str),
    #[error("unknown scalar_kind byte {0}")]
    BadScalarKind(u8),
    #[error("unknown bond direction byte {0}")]
    BadDirection(u8),
    #[error(transparent)]
    Tensor(#[from] symtensor_core::SymTensorError),
}

/// Serializes `tensor` to the binary wire format described above.
pub fn save<Q: Qnum>(tensor: &SymTensor<Q>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(tensor.status());
    out.push(match tensor.scalar_kind() {
        ScalarKind::Real => 0,
        ScalarKind::Complex => 1,
    });
    out.extend_from_slice(&(tensor.bonds().len() as u32).to_le_bytes());
    out.extend_from_slice(&(tensor.row_bond_count() as u32).to_le_bytes());

    for bond in tensor.bonds() {
        out.push(match bond.direction() {
            Direction::In => 0,
            Direction::Out => 1,
        });
        out.extend_from_slice(&(bond.states().len() as u32).to_le_bytes());
        for state in bond.states() {
            state.qnum.write_bytes(&mut out);
            out.extend_from_slice(&(state.degeneracy as u32).to_le_bytes());
        }
    }

    out.push(1u8); // labelsPresent: this crate always writes labels.
    for &label in tensor.labels() {
        out.extend_from_slice(&label.to_le_bytes());
    }

    let name_bytes = tensor.name().as_bytes();
    out.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(name_bytes);

    if tensor.status() & status::HAVEELEM != 0 {
        for (charge, block) in tensor.blocks() {
            charge.write_bytes(&mut out);
            let (rows, cols) = block.shape();
            out.extend_from_slice(&(rows as u32).to_le_bytes());
            out.extend_from_slice(&(cols as u32).to_le_bytes());
            match block.densify() {
                Block::Real { data, .. } => {
                    for v in data {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
                Block::Complex { data, .. } => {
                    for v in data {
                        out.extend_from_slice(&v.re.to_le_bytes());
                        out.extend_from_slice(&v.im.to_le_bytes());
                    }
                }
            }
        }
    }
    out
}

/// Deserializes a tensor previously produced by [`save`].
pub fn load<Q: Qnum>(bytes: &[u8]) -> Result<SymTensor<Q>, BinaryError> {
    let mut cursor = bytes;
    if cursor.len() < 4 || &cursor[..4] != MAGIC {
        return Err(BinaryError::BadMagic);
    }
    advance(&mut cursor, 4);

    let status_byte = take_u8(&mut cursor, "status")?;
    let scalar_kind = match take_u8(&mut cursor, "scalar_kind")? {
        0 => ScalarKind::Real,
        1 => ScalarKind::Complex,
        other => return Err(BinaryError::BadScalarKind(other)),
    };
    let bond_num = take_u32(&mut cursor, "bondNum")? as usize;
    let _in_bond_num = take_u32(&mut cursor, "inBondNum")? as usize;

    let mut bonds = Vec::with_capacity(bond_num);
    for _ in 0..bond_num {
        let direction = match take_u8(&mut cursor, "direction")? {
            0 => Direction::In,
            1 => Direction::Out,
            other => return Err(BinaryError::BadDirection(other)),
        };
        let state_count = take_u32(&mut cursor, "stateCount")? as usize;
        let mut states = Vec::with_capacity(state_count);
        for _ in 0..state_count {
            let qnum = Q::read_bytes(&mut cursor);
            let degeneracy = take_u32(&mut cursor, "multiplicity")? as usize;
            states.push((qnum, degeneracy));
        }
        bonds.push(Bond::new(direction, states));
    }

    let labels_present = take_u8(&mut cursor, "labelsPresent")? != 0;
    let labels = if labels_present {
        (0..bond_num).map(|_| take_i32(&mut cursor, "label")).collect::<Result<Vec<_>, _>>()?
    } else {
        (0..bond_num as i32).collect()
    };

    let name_len = take_u32(&mut cursor, "name length")? as usize;
    if cursor.len() < name_len {
        return Err(BinaryError::Truncated("name bytes"));
    }
    let name = String::from_utf8_lossy(&cursor[..name_len]).into_owned();
    advance(&mut cursor, name_len);

    let mut tensor = SymTensor::new(bonds, labels, scalar_kind, name)?;

    if status_byte & status::HAVEELEM != 0 {
        let charges: Vec<Q> = tensor.blocks().keys().cloned().collect();
        for _ in &charges {
            let charge = Q::read_bytes(&mut cursor);
            let rows = take_u32(&mut cursor, "rows")? as usize;
            let cols = take_u32(&mut cursor, "cols")? as usize;
            let block = match scalar_kind {
                ScalarKind::Real => {
                    let mut data = Vec::with_capacity(rows * cols);
                    for _ in 0..rows * cols {
                        data.push(take_f64(&mut cursor, "real payload")?);
                    }
                    Block::Real { rows, cols, diag: false, data }
                }
                ScalarKind::Complex => {
                    let mut data = Vec::with_capacity(rows * cols);
                    for _ in 0..rows * cols {
                        let re = take_f64(&mut cursor, "complex payload (re)")?;
                        let im = take_f64(&mut cursor, "complex payload (im)")?;
                        data.push(Complex64::new(re, im));
                    }
                    Block::Complex { rows, cols, diag: false, data }
                }
            };
            tensor.put_block(charge, block, false)?;
        }
    }

    Ok(tensor)
}

fn advance(cursor: &mut &[u8], n: usize) {
    *cursor = &cursor[n..];
}

fn take_u8(cursor: &mut &[u8], what: &'static str) -> Result<u8, BinaryError> {
    if cursor.is_empty() {
        return Err(BinaryError::Truncated(what));
    }
    let v = cursor[0];
    advance(cursor, 1);
    Ok(v)
}

fn take_u32(cursor: &mut &[u8], what: &'static str) -> Result<u32, BinaryError> {
    if cursor.len() < 4 {
        return Err(BinaryError::Truncated(what));
    }
    let v = u32::from_le_bytes(cursor[..4].try_into().unwrap());
    advance(cursor, 4);
    Ok(v)
}

fn take_i32(cursor: &mut &[u8], what: &'static str) -> Result<i32, BinaryError> {
    if cursor.len() < 4 {
        return Err(BinaryError::Truncated(what));
    }
    let v = i32::from_le_bytes(cursor[..4].try_into().unwrap());
    advance(cursor, 4);
    Ok(v)
}

fn take_f64(cursor: &mut &[u8], what: &'static str) -> Result<f64, BinaryError> {
    if cursor.len() < 8 {
        return Err(BinaryError::Truncated(what));
    }
    let v = f64::from_le_bytes(cursor[..8].try_into().unwrap());
    advance(cursor, 8);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64 as C64;
    use symtensor_core::U1;

    #[test]
    fn save_then_load_roundtrips_a_real_tensor() {
        let row = Bond::new(Direction::In, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let col = Bond::new(Direction::Out, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let mut t: SymTensor<U1> = SymTensor::new(vec![row, col], vec![1, 2], ScalarKind::Real, "t").unwrap();
        t.set_raw_elem(&[C64::new(1.0, 0.0), C64::new(0.0, 0.0), C64::new(0.0, 0.0), C64::new(2.0, 0.0)])
            .unwrap();

        let bytes = save(&t);
        let loaded: SymTensor<U1> = load(&bytes).unwrap();
        assert_eq!(loaded.labels(), t.labels());
        assert_eq!(loaded.get_raw_elem(), t.get_raw_elem());
        assert_eq!(loaded.status(), t.status());
    }

    #[test]
    fn load_rejects_bad_magic() {
        let err = load::<U1>(b"xxxx").unwrap_err();
        assert!(matches!(err, BinaryError::BadMagic));
    }
}
