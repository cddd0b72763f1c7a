use doa_locate::params::ScenarioParams;

fn main() {
    let params = ScenarioParams::default();
    let json = serde_json::to_string_pretty(&params).expect("scenario params serialize to json");
    println!("{json}");
}
