use crate::discretization::mesh::Mesh;
use crate::survey::Survey;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Write columns of data to a CSV file with headers
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                data.len()
            ),
        ));
    }

    let mut file = File::create(path)?;
    writeln!(file, "{}", headers.join(","))?;

    let n_rows = data.iter().map(|col| col.len()).max().unwrap_or(0);
    for i in 0..n_rows {
        let row: Vec<String> = data
            .iter()
            .map(|col| col.get(i).map(|v| format!("{:.15e}", v)).unwrap_or_default())
            .collect();
        writeln!(file, "{}", row.join(","))?;
    }

    Ok(())
}

/// Write one row per datum: `receiver,x,dtrue,dobs,std`.
///
/// `x` is the receiver cell centroid along x. Missing data vectors leave
/// their column empty.
pub fn write_survey<P: AsRef<Path>>(path: P, survey: &Survey, mesh: &Mesh) -> io::Result<()> {
    let cells = survey.receiver_cells();
    if let Some(bad) = cells.iter().find(|c| **c >= mesh.n_cells()) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Receiver cell {} is not on a mesh of {} cells", bad, mesh.n_cells()),
        ));
    }

    let column = |v: &Option<nalgebra::DVector<f64>>| v.as_ref().map(|d| d.as_slice().to_vec()).unwrap_or_default();
    let data = [
        cells.iter().map(|c| *c as f64).collect(),
        cells.iter().map(|c| mesh.cells[*c].centroid[0]).collect(),
        column(&survey.dtrue),
        column(&survey.dobs),
        column(&survey.std),
    ];

    write_csv(path, &["receiver", "x", "dtrue", "dobs", "std"], &data)
}
