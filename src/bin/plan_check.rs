use clap::Parser;
use procure_flow::app::services::SourcingResult;
use procure_flow::core::planning::{build_plan, spending_limit};
use procure_flow::domain::model::{Priority, ProcurementPlan};
use procure_flow::utils::logger;
use procure_flow::ProcureError;

#[derive(Parser)]
#[command(name = "plan-check")]
#[command(about = "Build a procurement plan offline from a saved sourcing result")]
struct Args {
    /// Sourcing result JSON as returned by POST /api/source-vendors
    #[arg(short, long)]
    input: String,

    /// Override the budget stored in the sourcing result
    #[arg(short, long)]
    budget: Option<f64>,

    /// Comma separated priorities, e.g. "cost,speed"
    #[arg(short, long, value_delimiter = ',')]
    priorities: Option<Vec<Priority>>,

    #[arg(long, default_value = "USDC")]
    currency: String,

    /// Write the plan as JSON to this path
    #[arg(short, long)]
    output: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn load(path: &str) -> procure_flow::Result<SourcingResult> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn print_plan(plan: &ProcurementPlan) {
    println!("📋 Plan {}", plan.id);
    for (i, item) in plan.items.iter().enumerate() {
        println!(
            "  {}. {} x{} from {} @ {:.2} + {:.2} shipping = {:.2}{}",
            i + 1,
            item.component.name,
            item.quantity,
            item.vendor.name,
            item.unit_price,
            item.shipping,
            item.total,
            if item.below_moq {
                format!(" (below MOQ {})", item.vendor.moq)
            } else {
                String::new()
            }
        );
    }
    println!(
        "  Subtotal {:.2}, shipping {:.2}, total {:.2} {}",
        plan.subtotal, plan.shipping_total, plan.total_cost, plan.currency
    );
    println!(
        "  Budget {:.2}, spending limit {:.2}",
        plan.budget, plan.spending_limit
    );
}

fn run(args: &Args) -> procure_flow::Result<bool> {
    let sourcing = load(&args.input)?;
    let budget = args.budget.unwrap_or(sourcing.budget);
    let priorities = args
        .priorities
        .clone()
        .unwrap_or_else(|| sourcing.priorities.clone());

    tracing::info!(
        "🧮 {} comparison(s), budget {:.2}, limit {:.2}",
        sourcing.comparisons.len(),
        budget,
        spending_limit(budget, &priorities)
    );

    let plan = build_plan(&sourcing.comparisons, budget, &priorities, &args.currency)?;
    print_plan(&plan);

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&plan)?)?;
        println!("📁 Plan saved to: {}", path);
    }

    Ok(plan.within_budget)
}

fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    match run(&args) {
        Ok(true) => println!("✅ Within budget"),
        Ok(false) => {
            println!("⚠️ Over the spending limit");
            std::process::exit(2);
        }
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}

fn report(e: &ProcureError) {
    tracing::error!("❌ plan-check failed: {}", e);
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
}
