/// Invocation packing for the vertex/tiler job pair
///
/// Vertex and tiler jobs are dispatched like compute jobs with a single
/// work group dimension per vertex. The six sizes are packed into one 32-bit
/// word, each field `ceil(log2(value))` bits wide, and the shifts are stored
/// separately.

/// Packed invocation fields of a job prefix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationPrefix {
    pub invocation_count: u32,
    pub size_y_shift: u8,
    pub size_z_shift: u8,
    pub workgroups_x_shift: u8,
    pub workgroups_y_shift: u8,
    pub workgroups_z_shift: u8,
    pub workgroups_x_shift_2: u8,
    pub workgroups_x_shift_3: u8,
}

fn logbase2_ceil(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        32 - (value - 1).leading_zeros()
    }
}

/// Pack `num` work groups of `size` invocations each
///
/// `graphics` applies the conventions the vertex/tiler pair expects.
pub fn pack_work_groups_compute(num: [u32; 3], size: [u32; 3], graphics: bool) -> InvocationPrefix {
    let values = [size[0], size[1], size[2], num[0], num[1], num[2]];
    let mut shifts = [0u32; 7];
    let mut packed = 0u32;

    for (i, &value) in values.iter().enumerate() {
        assert!(value >= 1, "work group dimension must be positive");
        // Fields past bit 31 do not fit the word
        packed |= (value - 1).checked_shl(shifts[i]).unwrap_or(0);
        shifts[i + 1] = shifts[i] + logbase2_ceil(value);
    }

    let mut prefix = InvocationPrefix {
        invocation_count: packed,
        size_y_shift: shifts[1] as u8,
        size_z_shift: shifts[2] as u8,
        workgroups_x_shift: shifts[3] as u8,
        workgroups_y_shift: shifts[4] as u8,
        workgroups_z_shift: shifts[5] as u8,
        ..Default::default()
    };

    if graphics {
        prefix.workgroups_z_shift = 32;
        prefix.workgroups_x_shift_2 = prefix.workgroups_x_shift.max(2);
    } else {
        prefix.workgroups_x_shift_2 = prefix.workgroups_x_shift;
    }

    prefix
}

/// Pack the shared invocation of a vertex job and its tiler job
///
/// Returns `(vertex, tiler)`.
pub fn pack_work_groups_fused(num: [u32; 3], size: [u32; 3]) -> (InvocationPrefix, InvocationPrefix) {
    let mut vertex = pack_work_groups_compute(num, size, true);
    let mut tiler = vertex;

    vertex.workgroups_x_shift_3 = 5;
    tiler.workgroups_x_shift_3 = vertex.workgroups_x_shift_2;

    (vertex, tiler)
}

/// Round an instanced vertex count up to a size the hardware can address
///
/// The result has the form `odd * 2^n` with `odd <= 15`. Counts below 10
/// are used as-is, as are counts above the largest such size in 32 bits.
pub fn padded_vertex_count(vertex_count: u32) -> u32 {
    if vertex_count < 10 {
        return vertex_count;
    }

    // Round up to the granularity that leaves at most 4 significant bits
    let bits = 32 - (vertex_count - 1).leading_zeros();
    let granule = 1u64 << bits.saturating_sub(4);
    let padded = (vertex_count as u64).div_ceil(granule) * granule;

    u32::try_from(padded).unwrap_or(vertex_count)
}

#[cfg(test)]
#[path = "work_groups_tests.rs"]
mod tests;
