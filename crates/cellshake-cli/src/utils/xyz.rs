use cellshake::core::forcefield::params::ForcefieldParams;
use cellshake::core::models::configuration::Configuration;
use std::io::{self, Write};

/// Writes every atom of the configuration as an XYZ frame, in molecule order.
pub fn write_xyz<W: Write>(
    cfg: &Configuration,
    params: &ForcefieldParams,
    comment: &str,
    writer: &mut W,
) -> io::Result<()> {
    writeln!(writer, "{}", cfg.n_atoms())?;
    writeln!(writer, "{}", comment.replace('\n', " "))?;
    for &molecule in cfg.molecule_ids() {
        let Some(molecule) = cfg.molecule(molecule) else {
            continue;
        };
        for &id in molecule.atoms() {
            let Some(atom) = cfg.atom(id) else {
                continue;
            };
            let name = params
                .atom_types
                .get(atom.type_index)
                .map_or("X", |t| t.name.as_str());
            let p = atom.position();
            writeln!(writer, "{:<4} {:12.6} {:12.6} {:12.6}", name, p.x, p.y, p.z)?;
        }
    }
    Ok(())
}
