use enedis_linky::LinkyApi;

fn main() {
    let login = std::env::var("UTILISATEUR_ENEDIS").expect("UTILISATEUR_ENEDIS must be set");
    let password = std::env::var("MOTDEPASSE_ENEDIS").expect("MOTDEPASSE_ENEDIS must be set");
    let mut linky = LinkyApi::new(login, password).expect("Failed to build the client");
    println!("linky: {:?}", linky);

    linky.authenticate().expect("Failed to authenticate");

    println!("session state: {:?}", linky.state());
}
