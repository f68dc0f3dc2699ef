use enedis_linky::api::consumption::ConsumptionHistory;
use enedis_linky::LinkyApi;

fn main() {
    let mut linky = LinkyApi::from_env_values().expect("Credentials must be set");
    linky.authenticate().expect("Failed to authenticate");

    let history = ConsumptionHistory::new(&linky);

    let years = history.per_year().expect("Failed to fetch yearly data");
    println!("{}", years.as_polars_df().unwrap());

    let months = history
        .per_month(2019)
        .expect("Failed to fetch monthly data");
    for (label, measurement) in months.iter() {
        println!("{}: {:?}", label, measurement);
    }

    let hours = history
        .per_hour(1, 8, 2019)
        .expect("Failed to fetch hourly data");
    println!("{}", hours.as_polars_df().unwrap());
}
