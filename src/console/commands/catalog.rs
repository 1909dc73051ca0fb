use crate::catalog::Catalog;
use crate::models::Tier;

fn load(file: Option<&str>) -> Result<Catalog, Box<dyn std::error::Error>> {
    Ok(Catalog::load(file)?)
}

pub struct ValidateCommand {
    file: Option<String>,
}

impl ValidateCommand {
    pub fn new(file: Option<String>) -> Self {
        Self { file }
    }
}

impl crate::console::commands::CallableTrait for ValidateCommand {
    fn call(&self) -> Result<(), Box<dyn std::error::Error>> {
        let catalog = load(self.file.as_deref())?;
        println!(
            "catalog {} is valid: {} plans across {} tiers",
            catalog.version(),
            catalog.plans().len(),
            Tier::ALL.len()
        );
        Ok(())
    }
}

pub struct ShowCommand {
    file: Option<String>,
}

impl ShowCommand {
    pub fn new(file: Option<String>) -> Self {
        Self { file }
    }
}

impl crate::console::commands::CallableTrait for ShowCommand {
    fn call(&self) -> Result<(), Box<dyn std::error::Error>> {
        let catalog = load(self.file.as_deref())?;
        println!("catalog {}", catalog.version());

        for tier in Tier::ALL {
            let features = catalog.features_for_tier(tier);
            println!("\n{} ({}), {} features", tier.label(), tier, features.len());
            for feature in features {
                let introduced = catalog.minimum_tier_for(&feature.key) == Some(tier);
                let marker = if introduced { "+" } else { " " };
                println!("  {} {:<28} {}", marker, feature.key, feature.label);
            }
            for plan in catalog.plans().into_iter().filter(|plan| plan.tier == tier) {
                println!(
                    "  plan {:<26} {:>10.2} {} / {}",
                    plan.id,
                    plan.price_cents as f64 / 100.0,
                    plan.currency,
                    plan.cycle
                );
            }
        }
        Ok(())
    }
}
