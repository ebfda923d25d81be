// Pure simulation systems driven by the world task each tick.

pub mod melee;
pub mod movement;
