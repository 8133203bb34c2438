// ===== synthforge/src/reports.rs =====
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use synthforge::individual::Individual;
use synthforge::problem::Problem;

/// Prints the final nondominated front, one column per metric worst case.
pub fn print_front<G>(problem: &Problem, front: &[Individual<G>]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("ID"), Cell::new("Age"), Cell::new("Feasible")];
    for m in &problem.metrics {
        header.push(Cell::new(format!("{} [{}]", m.name, m.aim())));
    }
    table.set_header(header);

    for ind in front {
        let mut row = vec![
            Cell::new(ind.id),
            Cell::new(ind.genetic_age),
            Cell::new(if ind.is_feasible(problem) { "yes" } else { "no" }),
        ];
        for m in &problem.metrics {
            row.push(match ind.worst_case_metric_value(m) {
                Some(v) => Cell::new(format!("{:.4}", v)).set_alignment(CellAlignment::Right),
                None => Cell::new("BAD"),
            });
        }
        table.add_row(row);
    }

    println!("\n=== 🏆 NONDOMINATED FRONT ({} individuals) ===", front.len());
    println!("{table}");
}
