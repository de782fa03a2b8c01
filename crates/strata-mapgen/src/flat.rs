use crate::{BlockMakeData, TerrainIds, paint_column};

/// Level ground at a fixed height, flooded up to the water level.
#[derive(Clone, Debug)]
pub struct FlatPainter {
    ground_level: i32,
    water_level: i32,
    ids: TerrainIds,
}

impl FlatPainter {
    pub fn new(ground_level: i32, water_level: i32, ids: TerrainIds) -> Self {
        Self {
            ground_level,
            water_level,
            ids,
        }
    }

    pub fn paint(&self, data: &mut BlockMakeData) {
        let area = data.node_area();
        for z in area.min.z..=area.max.z {
            for x in area.min.x..=area.max.x {
                paint_column(
                    &mut data.vmanip,
                    &self.ids,
                    x,
                    z,
                    area.min.y - 1..=area.max.y + 1,
                    self.ground_level,
                    self.water_level,
                );
            }
        }
    }
}
