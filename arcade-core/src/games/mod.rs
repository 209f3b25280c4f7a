pub mod light_cycles;
pub mod minesweeper;
