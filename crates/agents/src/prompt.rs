//! Household status snapshot and the prompt built from it.

use types::{AgentAction, GridStatus, HouseholdId, Price, Role, WorldState};

/// Operating rules every household is reminded of.
pub const OPERATING_RULES: &str = r#"CRITICAL RULES:
1. LOAD SHEDDING (Grid BLACKOUT): You CANNOT sell to the Grid.
2. MASJID CHARITY: If the Grid is in BLACKOUT, Battery > 90% and you have Excess Energy, DONATE to the Masjid.
3. P2P TRADING: If the Grid is ONLINE but expensive (> Rs 40), trade with your neighbour instead."#;

/// Everything a decision maker sees for one household in one step.
///
/// Owned so that both households' decisions can be produced concurrently
/// from the same frozen world.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdSnapshot {
    pub house: HouseholdId,
    pub role: Role,
    pub clock: String,
    pub is_daytime: bool,
    pub grid_status: GridStatus,
    pub grid_price: Price,
    pub solar_output: f64,
    pub current_load: f64,
    pub battery_level: f64,
}

impl HouseholdSnapshot {
    pub fn from_world(world: &WorldState, house: HouseholdId) -> Self {
        let household = world.household(house);
        Self {
            house,
            role: household.role,
            clock: world.simulation.clock.clone(),
            is_daytime: world.simulation.is_daytime(),
            grid_status: world.grid.status,
            grid_price: world.grid.price_per_unit,
            solar_output: household.solar_output,
            current_load: household.current_load,
            battery_level: household.battery_level,
        }
    }

    /// Net generation in kW, positive for excess.
    pub fn net_kw(&self) -> f64 {
        self.solar_output - self.current_load
    }

    /// The natural-language prompt submitted to the oracle.
    pub fn prompt(&self) -> String {
        let period = if self.is_daytime { "Day" } else { "Night" };
        let labels: Vec<&str> = AgentAction::ALL.iter().map(|a| a.label()).collect();

        format!(
            "You are the AI Energy Manager for {house} ({role}) in Pakistan.\n\
             Current Time: {clock} ({period})\n\
             \n\
             STATUS:\n\
             - Grid Status: {grid} (Price: {price}/kWh)\n\
             - Solar Output: {solar:.2} kW\n\
             - Current Load: {load:.2} kW\n\
             - Net Generation: {net:.2} kW (Positive=Excess, Negative=Deficit)\n\
             - My Battery: {battery:.0}%\n\
             \n\
             {rules}\n\
             \n\
             DECISION:\n\
             Return strict format: \"ACTION | REASONING\"\n\
             Allowed Actions: {actions}",
            house = self.house,
            role = self.role,
            clock = self.clock,
            grid = self.grid_status,
            price = self.grid_price,
            solar = self.solar_output,
            load = self.current_load,
            net = self.net_kw(),
            battery = self.battery_level,
            rules = OPERATING_RULES,
            actions = labels.join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> HouseholdSnapshot {
        let mut world = WorldState::initial();
        world.simulation.clock = "13:30:00".to_string();
        world.grid.price_per_unit = Price::from_float(46.0);
        world.house_a.solar_output = 2.5;
        world.house_a.current_load = 0.7;
        HouseholdSnapshot::from_world(&world, HouseholdId::HouseA)
    }

    #[test]
    fn test_snapshot_fields() {
        let snap = snapshot();
        assert_eq!(snap.role, Role::Producer);
        assert!(snap.is_daytime);
        assert!((snap.net_kw() - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = snapshot().prompt();
        assert!(prompt.contains("house_a (PRODUCER)"));
        assert!(prompt.contains("13:30:00 (Day)"));
        assert!(prompt.contains("Grid Status: ONLINE (Price: Rs 46.0/kWh)"));
        assert!(prompt.contains("Net Generation: 1.80 kW"));
        assert!(prompt.contains("My Battery: 85%"));
        assert!(prompt.contains("\"ACTION | REASONING\""));
        for action in AgentAction::ALL {
            assert!(prompt.contains(action.label()));
        }
    }

    #[test]
    fn test_prompt_night_consumer() {
        let world = WorldState::initial();
        let prompt = HouseholdSnapshot::from_world(&world, HouseholdId::HouseB).prompt();
        assert!(prompt.contains("house_b (CONSUMER)"));
        assert!(prompt.contains("00:00 (Night)"));
        assert!(prompt.contains("Net Generation: -1.50 kW"));
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = snapshot().prompt();
        let lines: Vec<&str> = prompt.lines().collect();
        assert_eq!(
            lines[0],
            "You are the AI Energy Manager for house_a (PRODUCER) in Pakistan."
        );
        assert_eq!(lines[1], "Current Time: 13:30:00 (Day)");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "STATUS:");
        assert_eq!(lines[4], "- Grid Status: ONLINE (Price: Rs 46.0/kWh)");
        assert_eq!(lines[9], "");
        assert_eq!(lines[10], "CRITICAL RULES:");
        assert!(lines[13].starts_with("3. P2P TRADING"));
        assert_eq!(lines[15], "DECISION:");
        assert!(lines[17].starts_with("Allowed Actions: HOLD, "));
        assert_eq!(lines.len(), 18);
    }
}
