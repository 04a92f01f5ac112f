use argh::FromArgs;
use backend::config::{TilingConfig, DEFAULT_MAX_TILE_SIZE, DEFAULT_OVERLAP};
use backend::grid_planner::{plan_grid_aligned, MODEL_SCALE_FACTOR};

#[derive(FromArgs, PartialEq, Debug)]
/// Print the tiling grid used for a prepared source image of the given size
struct PlanGrid {
    #[argh(positional)]
    width: u32,
    #[argh(positional)]
    height: u32,
    /// upper bound of a tile's extent in source pixels
    #[argh(option, default = "DEFAULT_MAX_TILE_SIZE")]
    max_tile_size: u32,
    /// source pixels trimmed from every shared tile edge
    #[argh(option, default = "DEFAULT_OVERLAP")]
    overlap: u32,
    /// factor the model upscales each tile by
    #[argh(option, default = "MODEL_SCALE_FACTOR")]
    scale_factor: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: PlanGrid = argh::from_env();

    let config = TilingConfig::default()
        .with_max_tile_size(args.max_tile_size)
        .with_overlap(args.overlap)
        .with_scale_factor(args.scale_factor);
    config.validate()?;

    let grid = plan_grid_aligned(
        args.width,
        args.height,
        config.max_tile_size,
        config.overlap,
        config.scale_factor,
    )?;

    println!(
        "{} tiles ({}x{}), tile extent {}, output {}",
        grid.len(),
        grid.horizontal_count(),
        grid.vertical_count(),
        grid.tile_extent(),
        grid.canvas().scaled(config.scale_factor)
    );
    for tile in &grid {
        let region = grid.paste_region(tile);
        println!(
            "x{}y{}: source {}x{}+{}+{}, pasted {}x{}+{}+{}",
            tile.col,
            tile.row,
            tile.width,
            tile.height,
            tile.x,
            tile.y,
            region.width,
            region.height,
            region.x,
            region.y
        );
    }

    Ok(())
}
