//! Reader for the nodal blocks of CalculiX `.frd` result files.

use std::collections::BTreeMap;
use std::io::BufRead;

use crate::errors::{ResultParseError, SolverError};
use crate::geometry::{displacement, Displacement};
use crate::store::NodeId;

/// Kind of nodal result block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    /// Nodal displacements (`DISP`).
    Displacement,
    /// Nodal stresses (`STRESS`).
    Stress,
}

impl Section {
    /// Recognise the line that opens a block.
    fn starting_at(line: &str) -> Option<Self> {
        let tail = line.get(5..)?;
        if tail.starts_with("DISP") {
            Some(Section::Displacement)
        } else if tail.starts_with("STRESS") {
            Some(Section::Stress)
        } else {
            None
        }
    }

    /// Lines at the top of a block, opening line included, that carry no data.
    const fn header_lines(self) -> usize {
        match self {
            Section::Displacement => 5,
            Section::Stress => 7,
        }
    }
}

/// Values of one result block, keyed by one-based solver node number.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultBlock {
    /// Values per solver node number.
    rows: BTreeMap<usize, Vec<f64>>,
}

impl ResultBlock {
    /// Values recorded for a solver node number.
    #[must_use]
    pub fn get(&self, solver_node: usize) -> Option<&[f64]> {
        self.rows.get(&solver_node).map(Vec::as_slice)
    }

    /// Values recorded for a mesh node.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&[f64]> {
        self.get(node.solver_number())
    }

    /// Number of nodes in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the block holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in ascending solver node order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f64])> + '_ {
        self.rows.iter().map(|(&node, values)| (node, values.as_slice()))
    }
}

/// Nodal displacement and stress blocks of a solver run, one per increment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverResults {
    /// Displacement blocks in file order.
    displacements: Vec<ResultBlock>,
    /// Stress blocks in file order.
    stresses: Vec<ResultBlock>,
}

impl SolverResults {
    /// Every displacement block in file order.
    #[must_use]
    pub fn displacement_blocks(&self) -> &[ResultBlock] {
        &self.displacements
    }

    /// Every stress block in file order.
    #[must_use]
    pub fn stress_blocks(&self) -> &[ResultBlock] {
        &self.stresses
    }

    /// Displacements of the final increment.
    #[must_use]
    pub fn final_displacements(&self) -> Option<&ResultBlock> {
        self.displacements.last()
    }

    /// Stresses of the final increment.
    #[must_use]
    pub fn final_stresses(&self) -> Option<&ResultBlock> {
        self.stresses.last()
    }

    /// In-plane displacement of a mesh node at the final increment.
    #[must_use]
    pub fn displacement(&self, node: NodeId) -> Option<Displacement> {
        match self.final_displacements()?.node(node)? {
            [x, y, ..] => Some(displacement(*x, *y)),
            _ => None,
        }
    }

    /// Stress components of a mesh node at the final increment.
    #[must_use]
    pub fn stress(&self, node: NodeId) -> Option<&[f64]> {
        self.final_stresses()?.node(node)
    }

    /// Largest in-plane displacement magnitude at the final increment.
    #[must_use]
    pub fn max_displacement(&self) -> Option<f64> {
        self.final_displacements()?
            .iter()
            .filter_map(|(_, values)| match values {
                [x, y, ..] => Some(x.hypot(*y)),
                _ => None,
            })
            .reduce(f64::max)
    }
}

/// Split a run of packed scientific-notation values such as
/// `" 1.00000E+00-2.50000E-01"`.
fn parse_packed(text: &str, line: usize) -> Result<Vec<f64>, ResultParseError> {
    let bad = |fragment: &str| ResultParseError::BadNumber {
        line,
        text: fragment.to_owned(),
    };
    let mut values = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let marker = rest.find('E').ok_or_else(|| bad(rest))?;
        let exponent = rest.get(marker + 1..marker + 4).ok_or_else(|| bad(rest))?;
        let mantissa = rest[..marker].trim();
        let value = format!("{mantissa}e{exponent}")
            .parse::<f64>()
            .map_err(|_| bad(&rest[..marker + 4]))?;
        values.push(value);
        rest = rest[marker + 4..].trim_start();
    }
    Ok(values)
}

/// One data line: node number in columns 3..13, packed values after.
fn parse_row(text: &str, line: usize) -> Result<(usize, Vec<f64>), ResultParseError> {
    let node = text
        .get(3..13)
        .and_then(|field| field.trim().parse::<usize>().ok())
        .ok_or(ResultParseError::MissingNode { line })?;
    let values = parse_packed(text.get(13..).unwrap_or_default(), line)?;
    Ok((node, values))
}

/// Read every displacement and stress block of a `.frd` stream.
///
/// # Errors
///
/// Returns [`SolverError::Io`] when reading fails and [`SolverError::Parse`]
/// for malformed data lines.
pub fn read_results<R: BufRead>(reader: R) -> Result<SolverResults, SolverError> {
    let mut results = SolverResults::default();
    let mut open: Option<(Section, usize, ResultBlock)> = None;

    let mut close = |open: &mut Option<(Section, usize, ResultBlock)>| {
        if let Some((section, _, block)) = open.take() {
            match section {
                Section::Displacement => results.displacements.push(block),
                Section::Stress => results.stresses.push(block),
            }
        }
    };

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if let Some(section) = Section::starting_at(line) {
            close(&mut open);
            open = Some((section, 0, ResultBlock::default()));
        }
        if line.starts_with(" -3") {
            close(&mut open);
            continue;
        }
        if let Some((section, seen, block)) = open.as_mut() {
            *seen += 1;
            if *seen <= section.header_lines() {
                continue;
            }
            let (node, values) = parse_row(line, index + 1)?;
            block.rows.insert(node, values);
        }
    }
    close(&mut open);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn row(node: usize, values: &str) -> String {
        format!(" -1{node:>10}{values}")
    }

    fn disp_block(rows: &[String]) -> String {
        let mut text = String::from(
            "    1PSTEP                         1           1           1\n\
             \x20-4  DISP        4    1\n\
             \x20-5  D1          1    2    1    0\n\
             \x20-5  D2          1    2    2    0\n\
             \x20-5  D3          1    2    3    0\n\
             \x20-5  ALL         1    2    0    0    1ALL\n",
        );
        for line in rows {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(" -3\n");
        text
    }

    fn stress_block(rows: &[String]) -> String {
        let mut text = String::from(" -4  STRESS      6    1\n");
        for component in ["SXX", "SYY", "SZZ", "SXY", "SYZ", "SZX"] {
            text.push_str(&format!(" -5  {component}         1    4    1    1\n"));
        }
        for line in rows {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(" -3\n");
        text
    }

    #[test]
    fn packed_values_split_on_exponents() {
        let values = parse_packed(" 1.00000E+00-2.50000E-01 3.12500E+02", 1).expect("valid");
        assert_eq!(values.len(), 3);
        assert_relative_eq!(values[0], 1.0);
        assert_relative_eq!(values[1], -0.25);
        assert_relative_eq!(values[2], 312.5);
        assert!(parse_packed("", 1).expect("empty").is_empty());
    }

    #[test]
    fn malformed_values_name_their_line() {
        assert_eq!(
            parse_packed(" 1.0x000E+00", 9),
            Err(ResultParseError::BadNumber {
                line: 9,
                text: "1.0x000E+00".to_owned()
            })
        );
        assert!(matches!(
            parse_packed(" 1.00000E+", 3),
            Err(ResultParseError::BadNumber { line: 3, .. })
        ));
        assert_eq!(
            parse_row(" -1      ", 4),
            Err(ResultParseError::MissingNode { line: 4 })
        );
    }

    #[test]
    fn headers_are_skipped_per_section() {
        let mut text = String::from("    2C                         8          1\n");
        text.push_str(&disp_block(&[
            row(1, " 0.00000E+00 0.00000E+00 0.00000E+00"),
            row(2, " 1.00000E-03-2.00000E-03 0.00000E+00"),
        ]));
        text.push_str(&stress_block(&[row(
            2,
            " 1.00000E+02 2.00000E+01 0.00000E+00 5.00000E+00 0.00000E+00 0.00000E+00",
        )]));
        text.push_str(" 9999\n");

        let results = read_results(text.as_bytes()).expect("valid file");
        assert_eq!(results.displacement_blocks().len(), 1);
        assert_eq!(results.stress_blocks().len(), 1);
        let final_disp = results.final_displacements().expect("one block");
        assert_eq!(final_disp.len(), 2);
        assert_eq!(final_disp.get(2), Some(&[1.0e-3, -2.0e-3, 0.0][..]));

        let moved = results.displacement(NodeId::new(1)).expect("node 2 in solver numbering");
        assert_relative_eq!(moved.x, 1.0e-3);
        assert_relative_eq!(moved.y, -2.0e-3);
        assert_eq!(results.stress(NodeId::new(1)).map(<[f64]>::len), Some(6));
        assert!(results.displacement(NodeId::new(5)).is_none());
    }

    #[test]
    fn last_block_is_the_final_increment() {
        let mut text = disp_block(&[row(1, " 1.00000E+00 0.00000E+00 0.00000E+00")]);
        text.push_str(&disp_block(&[
            row(1, " 3.00000E+00 4.00000E+00 0.00000E+00"),
            row(2, " 1.00000E+00 0.00000E+00 0.00000E+00"),
        ]));

        let results = read_results(text.as_bytes()).expect("valid file");
        assert_eq!(results.displacement_blocks().len(), 2);
        assert_eq!(
            results.displacement(NodeId::new(0)),
            Some(displacement(3.0, 4.0))
        );
        assert_relative_eq!(results.max_displacement().expect("nodes"), 5.0);
        assert!(results.final_stresses().is_none());
    }

    #[test]
    fn bad_data_lines_fail_the_read() {
        let text = disp_block(&[row(1, " 1.00000Q+00")]);
        let error = read_results(text.as_bytes()).expect_err("bad number");
        assert!(matches!(
            error,
            SolverError::Parse(ResultParseError::BadNumber { line: 7, .. })
        ));
    }
}
