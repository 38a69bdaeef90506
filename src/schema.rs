// Kept in sync with migrations/ by hand (same column order as the CREATE TABLE statements).

diesel::table! {
    raw_samples (time) {
        time -> Timestamptz,
        ext_temp_c -> Nullable<Float8>,
        indoor_temp_c -> Nullable<Float8>,
        indoor_setpoint_c -> Nullable<Float8>,
        silo_level_kg -> Nullable<Float8>,
        hopper_level_kg -> Nullable<Float8>,
        boiler_temp_c -> Nullable<Float8>,
        boiler_setpoint_c -> Nullable<Float8>,
        boiler_modulation_pct -> Nullable<Float8>,
        flame_temp_c -> Nullable<Float8>,
        flame_setpoint_c -> Nullable<Float8>,
        supply_temp_c -> Nullable<Float8>,
        supply_setpoint_c -> Nullable<Float8>,
        heating_pump -> Nullable<Float8>,
        heating_status -> Nullable<Int4>,
        ecs_temp_c -> Nullable<Float8>,
        ecs_stop_temp_c -> Nullable<Float8>,
        ecs_setpoint_c -> Nullable<Float8>,
        ecs_pump -> Nullable<Float8>,
        ecs_status -> Nullable<Int4>,
    }
}

diesel::table! {
    daily_summaries (id) {
        id -> Int8,
        day -> Date,
        window_start -> Timestamptz,
        window_end -> Timestamptz,
        sample_count -> Int4,
        boiler_on_seconds -> Float8,
        pellet_consumed_kg -> Float8,
        ext_temp_mean -> Nullable<Float8>,
        ext_temp_night_mean -> Nullable<Float8>,
        boiler_water_temp_mean -> Nullable<Float8>,
        supply_temp_mean -> Nullable<Float8>,
        indoor_temp_mean -> Nullable<Float8>,
        indoor_temp_night_mean -> Nullable<Float8>,
        ecs_temp_heat_mean -> Nullable<Float8>,
        ecs_temp_global_mean -> Nullable<Float8>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(raw_samples, daily_summaries);
