mod known_networks;
