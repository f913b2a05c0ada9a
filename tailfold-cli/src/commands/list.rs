use serde::Serialize;
use tailfold::fixtures::FIXTURES;

use crate::{
    app::GlobalOptions,
    commands::common::expectation_label,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct FixtureInfo {
    name: &'static str,
    params: usize,
    blocks: usize,
    expectation: String,
    description: &'static str,
}

pub fn run(opts: &GlobalOptions) -> anyhow::Result<()> {
    let mut fixtures = Vec::with_capacity(FIXTURES.len());
    for fixture in FIXTURES {
        let func = fixture.build()?;
        fixtures.push(FixtureInfo {
            name: fixture.name,
            params: func.params().len(),
            blocks: func.block_count(),
            expectation: expectation_label(fixture.expectation),
            description: fixture.description,
        });
    }

    print_output(&fixtures, opts, |fixtures| {
        let mut table = TabWriter::new(&[
            ("NAME", Align::Left),
            ("PARAMS", Align::Right),
            ("BLOCKS", Align::Right),
            ("EXPECTED", Align::Left),
            ("DESCRIPTION", Align::Left),
        ]);
        for info in fixtures {
            table.row(vec![
                info.name.to_string(),
                info.params.to_string(),
                info.blocks.to_string(),
                info.expectation.clone(),
                info.description.to_string(),
            ]);
        }
        table.print();
    })
}
